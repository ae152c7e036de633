//! Reasoning Engine
//!
//! Drives one user turn with an explicitly selected strategy:
//!
//! - `direct`: one model call, reply appended verbatim.
//! - `chain_of_thought`: one model call with step-by-step instructions; the
//!   whole structured reply is appended as a single assistant message.
//! - `react`: a Think → Act → Observe loop over the tool registry, bounded
//!   by a round cap.
//!
//! The engine never stores its system prompt in the conversation; it is
//! prepended each time a prompt is built, so history holds only the turns
//! that actually happened.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message, MessageMetadata};
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry, ToolResult, ToolSchema};

/// Reasoning strategy, chosen per call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningType {
    #[default]
    Direct,
    ChainOfThought,
    React,
}

impl ReasoningType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningType::Direct => "direct",
            ReasoningType::ChainOfThought => "chain_of_thought",
            ReasoningType::React => "react",
        }
    }
}

impl std::fmt::Display for ReasoningType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningType {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ReasoningType::Direct),
            "chain_of_thought" | "chain-of-thought" | "cot" => Ok(ReasoningType::ChainOfThought),
            "react" => Ok(ReasoningType::React),
            _ => Err(AgentError::UnsupportedStrategy(s.to_string())),
        }
    }
}

/// Which strategies may call tools
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolAccess {
    /// Only `react` gets tools
    #[default]
    StrategyGated,
    /// Any strategy gets tools when the request sets `use_tools`
    Always,
}

impl FromStr for ToolAccess {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strategy_gated" | "gated" => Ok(ToolAccess::StrategyGated),
            "always" => Ok(ToolAccess::Always),
            other => Err(AgentError::Config(format!("unknown tool access policy: {other}"))),
        }
    }
}

/// One user turn to reason about
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReasoningRequest {
    pub message: String,
    pub reasoning_type: ReasoningType,
    pub use_tools: bool,
}

impl ReasoningRequest {
    pub fn new(message: impl Into<String>, reasoning_type: ReasoningType) -> Self {
        Self {
            message: message.into(),
            reasoning_type,
            use_tools: true,
        }
    }

    pub fn with_tools(mut self, use_tools: bool) -> Self {
        self.use_tools = use_tools;
        self
    }

    /// Build from the loosely typed chat shape; a missing strategy means `direct`
    pub fn from_parts(
        message: impl Into<String>,
        reasoning_type: Option<&str>,
        use_tools: bool,
    ) -> Result<Self> {
        let reasoning_type = reasoning_type
            .map(ReasoningType::from_str)
            .transpose()?
            .unwrap_or_default();
        Ok(Self::new(message, reasoning_type).with_tools(use_tools))
    }
}

/// One intermediate step of a reasoning turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TraceStep {
    Thought { content: String },
    Action { tool: String, arguments: Value },
    Observation { content: String, success: bool },
}

/// A tool call made during a turn and its outcome
#[derive(Clone, Debug, Serialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: Value,
    pub result: ToolResult,
}

/// Outcome of a reasoning turn
#[derive(Clone, Debug, Serialize)]
pub struct ReasoningResult {
    pub response: String,
    pub reasoning_type: ReasoningType,
    pub trace: Vec<TraceStep>,
    pub tool_invocations: Vec<ToolInvocation>,
    /// Model calls made
    pub rounds: usize,
    /// Set when the ReAct loop hit its round cap
    pub incomplete: bool,
}

/// Engine configuration
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Base system prompt
    pub system_prompt: String,

    /// Generation options
    pub generation: GenerationOptions,

    /// Maximum model calls in one ReAct turn
    pub max_react_rounds: usize,

    /// Deadline for each model call
    pub transport_timeout: Duration,

    /// Which strategies may use tools
    pub tool_access: ToolAccess,

    /// Token budget for the history slice sent with each prompt
    pub context_window_tokens: u32,

    /// Whether to describe tools in the ReAct system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            generation: GenerationOptions::default(),
            max_react_rounds: 6,
            transport_timeout: Duration::from_secs(60),
            tool_access: ToolAccess::default(),
            context_window_tokens: 8192,
            inject_tool_descriptions: true,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful research assistant. \
Answer accurately and concisely, say so when you are unsure, and build on \
what was said earlier in the conversation.";

const CHAIN_OF_THOUGHT_INSTRUCTIONS: &str = r"Think through the problem step by step before answering.
Lay out your reasoning as numbered steps, then finish with a line starting with
`Final Answer:` followed by your answer.";

const REACT_INSTRUCTIONS: &str = r#"Solve the task by alternating Thought, Action and Observation steps.

Each reply must start with `Thought:` followed by your reasoning. Then either:

- request a tool:
  Action: tool_name
  Action Input: {"arg": "value"}
- or finish:
  Final Answer: your answer to the user

After each action you will receive an `Observation:` with the tool result.
Request one action per reply."#;

const REACT_NO_TOOLS: &str = "No tools are available for this request. \
Reason with `Thought:` steps and finish with `Final Answer:`.";

/// The reasoning engine
pub struct ReasoningEngine {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: EngineConfig,
}

/// ReAct loop states
enum ReactState {
    Think,
    Act { turn: String, call: ToolCall },
    Finish { answer: String },
    Exhausted,
}

/// What one model reply asked for
enum ReactStep {
    Act { thought: Option<String>, call: ToolCall },
    Finish { thought: Option<String>, answer: String },
}

/// Per-turn bookkeeping shared by the strategies
#[derive(Default)]
struct TurnLog {
    trace: Vec<TraceStep>,
    tool_invocations: Vec<ToolInvocation>,
    rounds: usize,
}

impl ReasoningEngine {
    /// Create a new engine
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, EngineConfig::default())
    }

    /// Run one user turn against `conversation`.
    ///
    /// The user message is appended before the first model call. On error
    /// the steps that already completed stay in the history.
    #[tracing::instrument(skip_all, fields(strategy = %request.reasoning_type, use_tools = request.use_tools))]
    pub async fn reason(
        &self,
        conversation: &mut Conversation,
        request: &ReasoningRequest,
    ) -> Result<ReasoningResult> {
        conversation.append(Message::user(&request.message));

        let result = match request.reasoning_type {
            ReasoningType::Direct | ReasoningType::ChainOfThought => {
                self.run_single(conversation, request).await?
            }
            ReasoningType::React => self.run_react(conversation, request.use_tools).await?,
        };

        let turns = conversation
            .context()
            .get("turns")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            + 1;
        conversation.set_context("turns", json!(turns));
        conversation.set_context("last_reasoning_type", json!(result.reasoning_type));

        tracing::info!(
            rounds = result.rounds,
            tools = result.tool_invocations.len(),
            incomplete = result.incomplete,
            "Reasoning turn finished"
        );
        Ok(result)
    }

    /// Direct and chain-of-thought: a single answering call
    async fn run_single(
        &self,
        conversation: &mut Conversation,
        request: &ReasoningRequest,
    ) -> Result<ReasoningResult> {
        let strategy = request.reasoning_type;
        let system = match strategy {
            ReasoningType::ChainOfThought => format!(
                "{}\n\n{}",
                self.config.system_prompt, CHAIN_OF_THOUGHT_INSTRUCTIONS
            ),
            _ => self.config.system_prompt.clone(),
        };

        let offer_tools = request.use_tools
            && self.config.tool_access == ToolAccess::Always
            && !self.tools.is_empty();
        let schemas = offer_tools.then(|| self.tools.schemas());

        let mut log = TurnLog::default();
        let mut completion = self
            .call_model(&mut log, conversation, &system, schemas.as_deref())
            .await?;

        // Tools are an optional augmentation here: one action, then answer.
        if let Some(call) = completion.tool_call.take() {
            self.act(conversation, &mut log, &completion.content, call, offer_tools)
                .await;
            completion = self.call_model(&mut log, conversation, &system, None).await?;
        }

        let response = completion.content.trim().to_string();
        if response.is_empty() {
            return Err(AgentError::Provider("model returned an empty reply".into()));
        }

        if strategy == ReasoningType::ChainOfThought {
            if let Some((reasoning, _)) = split_final_answer(&response) {
                log.trace.push(TraceStep::Thought { content: reasoning });
            }
        }

        conversation.append(assistant_message(&response, &completion.model));
        Ok(Self::finish(response, strategy, log, false))
    }

    /// ReAct: explicit Think / Act / Finish state loop with a round cap
    async fn run_react(
        &self,
        conversation: &mut Conversation,
        use_tools: bool,
    ) -> Result<ReasoningResult> {
        let tools_enabled = use_tools && !self.tools.is_empty();
        let system = self.react_system_prompt(tools_enabled);
        let schemas = tools_enabled.then(|| self.tools.schemas());

        let mut log = TurnLog::default();
        let mut last_thought: Option<String> = None;
        let mut state = ReactState::Think;

        loop {
            state = match state {
                ReactState::Think => {
                    if log.rounds >= self.config.max_react_rounds {
                        ReactState::Exhausted
                    } else {
                        match self
                            .call_model(&mut log, conversation, &system, schemas.as_deref())
                            .await
                        {
                            Ok(completion) => {
                                let turn = completion.content.trim().to_string();
                                match parse_react_step(completion) {
                                    ReactStep::Act { thought, call } => {
                                        if let Some(thought) = thought {
                                            log.trace.push(TraceStep::Thought {
                                                content: thought.clone(),
                                            });
                                            last_thought = Some(thought);
                                        }
                                        ReactState::Act { turn, call }
                                    }
                                    ReactStep::Finish { thought, answer } => {
                                        if let Some(thought) = thought {
                                            log.trace.push(TraceStep::Thought { content: thought });
                                        }
                                        ReactState::Finish { answer }
                                    }
                                }
                            }
                            Err(e) if e.is_recoverable() => {
                                tracing::warn!(error = %e, round = log.rounds, "Model call failed, continuing");
                                log.trace.push(TraceStep::Observation {
                                    content: format!("The model call failed: {e}"),
                                    success: false,
                                });
                                ReactState::Think
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
                ReactState::Act { turn, call } => {
                    self.act(conversation, &mut log, &turn, call, tools_enabled)
                        .await;
                    ReactState::Think
                }
                ReactState::Finish { answer } => {
                    conversation.append(assistant_message(&answer, &self.config.generation.model));
                    return Ok(Self::finish(answer, ReasoningType::React, log, false));
                }
                ReactState::Exhausted => {
                    tracing::warn!(
                        max_rounds = self.config.max_react_rounds,
                        "ReAct round cap reached"
                    );
                    let answer = exhausted_answer(self.config.max_react_rounds, last_thought.as_deref());
                    conversation.append(assistant_message(&answer, &self.config.generation.model));
                    return Ok(Self::finish(answer, ReasoningType::React, log, true));
                }
            };
        }
    }

    /// Record the assistant's action turn, run the tool and append the observation
    async fn act(
        &self,
        conversation: &mut Conversation,
        log: &mut TurnLog,
        turn: &str,
        mut call: ToolCall,
        tools_enabled: bool,
    ) {
        let call_id = call
            .id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        let arguments = json!(call.arguments);

        let turn = if turn.is_empty() {
            format!("Action: {}\nAction Input: {arguments}", call.name)
        } else {
            turn.to_string()
        };
        conversation.append(Message::assistant(turn).with_metadata(MessageMetadata {
            tool_call_id: Some(call_id.clone()),
            tool_name: Some(call.name.clone()),
            model: Some(self.config.generation.model.clone()),
            ..Default::default()
        }));
        log.trace.push(TraceStep::Action {
            tool: call.name.clone(),
            arguments: arguments.clone(),
        });

        let result = if tools_enabled {
            match self.tools.execute(&call).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "Tool call rejected");
                    ToolResult::failure(&call.name, e.to_string()).with_id(Some(call_id.clone()))
                }
            }
        } else {
            ToolResult::failure(&call.name, "tool use is disabled for this request")
                .with_id(Some(call_id.clone()))
        };

        let observation = result.observation();
        conversation.append(Message::tool(
            format!("Observation: {observation}"),
            &call.name,
            Some(call_id),
        ));
        log.trace.push(TraceStep::Observation {
            content: observation,
            success: result.is_success(),
        });
        log.tool_invocations.push(ToolInvocation {
            tool: call.name,
            arguments,
            result,
        });
    }

    /// One bounded model call over the system prompt plus recent history
    async fn call_model(
        &self,
        log: &mut TurnLog,
        conversation: &Conversation,
        system: &str,
        tools: Option<&[ToolSchema]>,
    ) -> Result<Completion> {
        log.rounds += 1;

        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message::system(system));
        messages.extend_from_slice(conversation.window(self.config.context_window_tokens));

        tracing::debug!(
            provider = self.provider.name(),
            round = log.rounds,
            messages = messages.len(),
            tools = tools.map_or(0, <[ToolSchema]>::len),
            "Calling model"
        );

        let timeout = self.config.transport_timeout;
        tokio::time::timeout(
            timeout,
            self.provider.complete(&messages, tools, &self.config.generation),
        )
        .await
        .map_err(|_| AgentError::Timeout(timeout))?
    }

    fn react_system_prompt(&self, tools_enabled: bool) -> String {
        let mut prompt = format!("{}\n\n", self.config.system_prompt);
        if tools_enabled {
            prompt.push_str(REACT_INSTRUCTIONS);
            if self.config.inject_tool_descriptions {
                prompt.push_str("\n\n");
                prompt.push_str(&self.tools.generate_prompt_section());
            }
        } else {
            prompt.push_str(REACT_NO_TOOLS);
        }
        prompt
    }

    fn finish(
        response: String,
        reasoning_type: ReasoningType,
        log: TurnLog,
        incomplete: bool,
    ) -> ReasoningResult {
        ReasoningResult {
            response,
            reasoning_type,
            trace: log.trace,
            tool_invocations: log.tool_invocations,
            rounds: log.rounds,
            incomplete,
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get the provider
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Get configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn assistant_message(content: &str, model: &str) -> Message {
    Message::assistant(content).with_metadata(MessageMetadata {
        model: Some(model.to_string()),
        ..Default::default()
    })
}

fn exhausted_answer(max_rounds: usize, last_thought: Option<&str>) -> String {
    match last_thought {
        Some(thought) => format!(
            "I could not reach a final answer within {max_rounds} reasoning steps. \
             Based on my last reasoning: {thought}"
        ),
        None => format!("I could not reach a final answer within {max_rounds} reasoning steps."),
    }
}

/// Byte offset of `marker` in `text`, ignoring ASCII case
fn find_marker(text: &str, marker: &str) -> Option<usize> {
    text.to_ascii_lowercase().find(&marker.to_ascii_lowercase())
}

/// Split `... Final Answer: X` into the reasoning before and the answer after
fn split_final_answer(text: &str) -> Option<(String, String)> {
    const MARKER: &str = "Final Answer:";
    let idx = find_marker(text, MARKER)?;
    let reasoning = strip_label(&text[..idx], &["Thought:", "Reasoning:"]);
    let answer = text[idx + MARKER.len()..].trim().to_string();
    Some((reasoning, answer))
}

fn strip_label(text: &str, labels: &[&str]) -> String {
    let trimmed = text.trim();
    labels
        .iter()
        .find_map(|label| {
            find_marker(trimmed, label)
                .filter(|idx| *idx == 0)
                .map(|_| trimmed[label.len()..].trim())
        })
        .unwrap_or(trimmed)
        .to_string()
}

/// Text before the first action/answer marker, without its `Thought:` label
fn extract_thought(text: &str) -> Option<String> {
    let end = ["Action:", "Final Answer:", "```tool"]
        .iter()
        .filter_map(|marker| find_marker(text, marker))
        .min()
        .unwrap_or(text.len());
    let thought = strip_label(&text[..end], &["Thought:"]);
    (!thought.is_empty()).then_some(thought)
}

fn parse_react_step(completion: Completion) -> ReactStep {
    let text = completion.content.trim();
    let thought = extract_thought(text);

    if let Some(call) = completion.tool_call {
        return ReactStep::Act { thought, call };
    }

    if let Some((_, answer)) = split_final_answer(text) {
        return ReactStep::Finish { thought, answer };
    }

    if let Some(call) = parse_tool_block(text).or_else(|| parse_action_lines(text)) {
        return ReactStep::Act { thought, call };
    }

    // Off-protocol reply: take it as the answer
    ReactStep::Finish {
        thought: None,
        answer: strip_label(text, &["Thought:"]),
    }
}

/// ```` ```tool {"tool": "...", "arguments": {...}} ``` ````
fn parse_tool_block(content: &str) -> Option<ToolCall> {
    let tool_start = "```tool";
    let start_idx = content.find(tool_start)?;
    let after_marker = &content[start_idx + tool_start.len()..];
    let end_idx = after_marker.find("```")?;
    serde_json::from_str::<ToolCall>(after_marker[..end_idx].trim()).ok()
}

/// `Action: name` followed by `Action Input: {json}`
fn parse_action_lines(content: &str) -> Option<ToolCall> {
    const ACTION: &str = "Action:";
    const INPUT: &str = "Action Input:";

    let action_idx = find_marker(content, ACTION)?;
    let name_line = content[action_idx + ACTION.len()..].lines().next()?;
    let name = name_line.trim().trim_matches('`').trim();
    if name.is_empty() {
        return None;
    }

    let arguments = find_marker(content, INPUT)
        .map(|idx| &content[idx + INPUT.len()..])
        .and_then(|rest| {
            let start = rest.find('{')?;
            let end = rest.rfind('}')?;
            (end > start).then(|| &rest[start..=end])
        })
        .and_then(|json_str| serde_json::from_str::<Value>(json_str).ok())
        .unwrap_or(Value::Null);

    Some(ToolCall::new(name, arguments))
}

/// Builder for the reasoning engine
pub struct EngineBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Arc<ToolRegistry>,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: Arc::new(ToolRegistry::new()),
            config: EngineConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_react_rounds(mut self, max: usize) -> Self {
        self.config.max_react_rounds = max;
        self
    }

    pub fn transport_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport_timeout = timeout;
        self
    }

    pub fn tool_access(mut self, access: ToolAccess) -> Self {
        self.config.tool_access = access;
        self
    }

    pub fn build(self) -> Result<ReasoningEngine> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        if self.config.max_react_rounds == 0 {
            return Err(AgentError::Config("max_react_rounds must be at least 1".into()));
        }

        Ok(ReasoningEngine::new(provider, self.tools, self.config))
    }
}
