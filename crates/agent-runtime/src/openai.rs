//! OpenAI-compatible LLM Provider
//!
//! Implementation of `LlmProvider` for any server exposing
//! `POST {base_url}/chat/completions` (Groq, self-hosted gateways, ...).

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Provider configuration, already resolved
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Which server profile was selected (`GROQ`, `NGU`)
    pub server: String,

    /// Bearer token
    pub api_key: String,

    /// Base URL, without the trailing `/chat/completions`
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Resolve from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from any key lookup.
    ///
    /// `MODEL_SERVER` picks the profile (default `GROQ`); the profile's
    /// `<PREFIX>_API_KEY`, `<PREFIX>_BASE_URL` and `<PREFIX>_MODEL` fill it.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let server = lookup("MODEL_SERVER")
            .unwrap_or_else(|| "GROQ".into())
            .trim()
            .to_uppercase();

        let (default_base, default_model) = match server.as_str() {
            "GROQ" => (Some(GROQ_BASE_URL), Some(GROQ_DEFAULT_MODEL)),
            "NGU" => (None, None),
            other => {
                return Err(AgentError::Config(format!("Unsupported MODEL_SERVER: {other}")));
            }
        };

        let required = |suffix: &str, default: Option<&str>| {
            let key = format!("{server}_{suffix}");
            lookup(&key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| default.map(str::to_string))
                .ok_or_else(|| AgentError::Config(format!("{key} is not set")))
        };

        let api_key = required("API_KEY", None)?;
        let base_url = required("BASE_URL", default_base)?
            .trim_end_matches('/')
            .to_string();
        let model = required("MODEL", default_model)?;
        let timeout_secs = lookup("LLM_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        Ok(Self {
            server,
            api_key,
            base_url,
            model,
            timeout_secs,
        })
    }
}

/// OpenAI-compatible chat-completion provider
pub struct OpenAiCompatProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiCompatProvider {
    /// Create from configuration
    pub fn from_config(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(ProviderConfig::from_env()?)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Convert agent messages to the wire format.
    ///
    /// Tool observations go out as user context; the engine does not track
    /// provider-side tool-call ids.
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User | Role::Tool => "user",
                    Role::Assistant => "assistant",
                },
                content: &m.content,
            })
            .collect()
    }

    /// Convert a wire response to an agent completion
    fn convert_completion(response: ChatResponse, requested_model: &str) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("response contained no choices".into()))?;

        let content = choice.message.content.unwrap_or_default();
        let tool_call = choice.message.tool_calls.into_iter().next().map(|call| {
            let raw = call.function.arguments.trim();
            let arguments = if raw.is_empty() {
                Value::Null
            } else {
                // Malformed JSON is kept so validation can report it
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            };
            let tool_call = ToolCall::new(call.function.name, arguments);
            match call.id {
                Some(id) => tool_call.with_id(id),
                None => tool_call,
            }
        });

        if content.trim().is_empty() && tool_call.is_none() {
            return Err(AgentError::Provider("model returned an empty completion".into()));
        }

        let finish_reason = choice.finish_reason.as_deref().map(|reason| match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolUse,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        });

        Ok(Completion {
            content,
            tool_call,
            model: response.model.unwrap_or_else(|| requested_model.to_string()),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason,
        })
    }
}

/// Map a non-success HTTP status to a transport error kind
fn status_error(status: StatusCode, body: &str) -> AgentError {
    let detail = format!("{status}: {}", body.chars().take(300).collect::<String>());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            AgentError::ProviderUnavailable(detail)
        }
        s if s.is_server_error() => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    }
}

fn request_error(err: &reqwest::Error, timeout: Duration) -> AgentError {
    if err.is_timeout() {
        AgentError::Timeout(timeout)
    } else if err.is_connect() {
        AgentError::ProviderUnavailable(format!("Connection failed: {err}"))
    } else {
        AgentError::Provider(format!("Request failed: {err}"))
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.server
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/models", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                tracing::warn!(provider = %self.config.server, "Health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        options: &GenerationOptions,
    ) -> Result<Completion> {
        // Blank model in options falls back to the configured one
        let model = if options.model.is_empty() {
            self.config.model.as_str()
        } else {
            options.model.as_str()
        };

        let tools: Option<Vec<Value>> = tools
            .filter(|t| !t.is_empty())
            .map(|t| t.iter().map(ToolSchema::to_function_schema).collect());

        let request = ChatRequest {
            model,
            messages: Self::convert_messages(messages),
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stop: (!options.stop_sequences.is_empty()).then_some(options.stop_sequences.as_slice()),
            tool_choice: tools.as_ref().map(|_| "auto"),
            tools,
        };

        tracing::debug!(model, messages = messages.len(), "Sending chat completion");

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("Failed to parse completion: {e}")))?;

        Self::convert_completion(body, model)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
