//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are registered once at startup, then the registry is frozen behind
//! an `Arc` and shared by every engine and session.
//!
//! Every execution goes through the same envelope: arguments are validated
//! against the tool's parameter schema, the handler runs under a deadline,
//! and whatever happens inside it comes back as a [`ToolResult`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{AgentError, Result};

/// Default deadline for a single tool execution
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Tool call request from the LLM
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: HashMap<String, Value>,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    /// Build a call from a JSON arguments object.
    ///
    /// A non-object payload is kept under an `input` key so that schema
    /// validation can reject it with a readable message.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => HashMap::new(),
            other => HashMap::from([("input".to_string(), other)]),
        };

        Self {
            name: name.into(),
            arguments,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Outcome of one tool execution.
///
/// Exactly one of `data` / `error` is set; the only way to build a value is
/// through [`ToolResult::success`] or [`ToolResult::failure`].
#[derive(Clone, Debug, Serialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID (if provided in request)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    success: bool,
    data: Option<Value>,
    error: Option<String>,

    #[serde(skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, Value>,
}

impl ToolResult {
    /// A `null` payload becomes an empty object so a success always carries data
    pub fn success(name: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Null => Value::Object(serde_json::Map::new()),
            data => data,
        };
        Self {
            name: name.into(),
            id: None,
            success: true,
            data: Some(data),
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    /// Text form fed back to the model as an observation
    pub fn observation(&self) -> String {
        match (&self.data, &self.error) {
            (Some(Value::String(text)), _) => text.clone(),
            (Some(data), _) => {
                serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
            }
            (None, Some(error)) => format!("The action failed: {error}"),
            (None, None) => String::new(),
        }
    }
}

/// JSON Schema type of a tool parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Whether `value` has this type
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

impl ToolSchema {
    /// Check `arguments` against the declared parameters.
    ///
    /// Unknown, missing, mistyped and out-of-enum fields are all collected
    /// into one `Validation` error. Defaults fill absent optional fields.
    pub fn validate(&self, arguments: &HashMap<String, Value>) -> Result<ToolArgs> {
        let mut problems = Vec::new();

        let mut unknown: Vec<&String> = arguments
            .keys()
            .filter(|key| !self.parameters.iter().any(|p| &p.name == *key))
            .collect();
        unknown.sort();
        for key in unknown {
            problems.push(format!("unknown parameter `{key}`"));
        }

        let mut validated = Map::new();
        for param in &self.parameters {
            match arguments.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        problems.push(format!("missing required parameter `{}`", param.name));
                    } else if let Some(default) = &param.default {
                        validated.insert(param.name.clone(), default.clone());
                    }
                }
                Some(value) if !param.param_type.matches(value) => {
                    problems.push(format!("`{}` must be of type {}", param.name, param.param_type));
                }
                Some(value) => match &param.enum_values {
                    Some(allowed) if !allowed.contains(value) => {
                        let allowed: Vec<String> = allowed.iter().map(Value::to_string).collect();
                        problems.push(format!(
                            "`{}` must be one of {}",
                            param.name,
                            allowed.join(", ")
                        ));
                    }
                    _ => {
                        validated.insert(param.name.clone(), value.clone());
                    }
                },
            }
        }

        if problems.is_empty() {
            Ok(ToolArgs(validated))
        } else {
            Err(AgentError::Validation(format!(
                "{}: {}",
                self.name,
                problems.join("; ")
            )))
        }
    }

    /// OpenAI-style function tool definition
    pub fn to_function_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut property = json!({
                "type": param.param_type.as_str(),
                "description": param.description,
            });
            if let Some(values) = &param.enum_values {
                property["enum"] = Value::Array(values.clone());
            }
            if let Some(default) = &param.default {
                property["default"] = default.clone();
            }
            if param.param_type == ParamType::Array {
                property["items"] = json!({ "type": "string" });
            }
            properties.insert(param.name.clone(), property);
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                },
            },
        })
    }
}

/// Arguments that passed schema validation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Deserialize into the tool's typed argument record
    pub fn parse<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(Value::Object(self.0))
            .map_err(|e| AgentError::Validation(e.to_string()))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with validated arguments
    async fn execute(&self, args: ToolArgs) -> Result<Value>;
}

struct RegisteredTool {
    schema: ToolSchema,
    handler: Arc<dyn Tool>,
}

/// Registry for available tools
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    call_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            call_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Set the per-call deadline
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let schema = tool.schema();
        if self.tools.contains_key(&schema.name) {
            return Err(AgentError::DuplicateTool(schema.name));
        }

        tracing::debug!(tool = %schema.name, "Registering tool");
        self.tools.insert(
            schema.name.clone(),
            RegisteredTool {
                schema,
                handler: tool,
            },
        );
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.handler.clone())
    }

    /// Execute a tool call.
    ///
    /// Unknown names and invalid arguments are returned as errors without
    /// touching the handler. Anything that goes wrong inside the handler
    /// (error, panic, deadline) is folded into a failed `ToolResult`.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let entry = self
            .tools
            .get(&call.name)
            .ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;

        let args = entry.schema.validate(&call.arguments)?;

        let started = Instant::now();
        let handler = entry.handler.clone();
        let guarded = AssertUnwindSafe(handler.execute(args)).catch_unwind();

        let result = match tokio::time::timeout(self.call_timeout, guarded).await {
            Ok(Ok(Ok(data))) => ToolResult::success(&call.name, data),
            Ok(Ok(Err(e))) => ToolResult::failure(&call.name, handler_error_message(e)),
            Ok(Err(panic)) => ToolResult::failure(
                &call.name,
                format!("tool panicked: {}", panic_message(panic.as_ref())),
            ),
            Err(_) => ToolResult::failure(
                &call.name,
                AgentError::Timeout(self.call_timeout).to_string(),
            ),
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if result.is_success() {
            tracing::debug!(tool = %call.name, elapsed_ms, "Tool succeeded");
        } else {
            tracing::warn!(
                tool = %call.name,
                elapsed_ms,
                error = result.error().unwrap_or_default(),
                "Tool failed"
            );
        }

        Ok(result
            .with_id(call.id.clone())
            .with_metadata("elapsed_ms", json!(elapsed_ms)))
    }

    /// Get all tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema.clone()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Get tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate system prompt section describing available tools
    pub fn generate_prompt_section(&self) -> String {
        let mut prompt = String::from("## Available Tools\n\n");

        for schema in self.schemas() {
            prompt.push_str(&format!("### {}\n", schema.name));
            prompt.push_str(&format!("{}\n", schema.description));

            if !schema.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &schema.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    prompt.push_str(&format!(
                        "- `{}` ({}){}: {}\n",
                        param.name, param.param_type, required, param.description
                    ));
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}

fn handler_error_message(err: AgentError) -> String {
    match err {
        AgentError::ToolExecution(msg) => msg,
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Deserialize)]
    struct EchoArgs {
        text: String,
        times: u32,
    }

    struct EchoTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Repeat text".into(),
                parameters: vec![
                    ParameterSchema::required("text", ParamType::String, "Text to repeat"),
                    ParameterSchema::optional("times", ParamType::Integer, "Repetitions")
                        .with_default(json!(1)),
                    ParameterSchema::optional("style", ParamType::String, "Output style")
                        .with_enum(vec![json!("plain"), json!("loud")]),
                ],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, args: ToolArgs) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let args: EchoArgs = args.parse()?;
            if args.text == "boom" {
                return Err(AgentError::ToolExecution("echo exploded".into()));
            }
            if args.text == "panic" {
                panic!("echo panicked");
            }
            if args.text == "slow" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            let repeat = usize::try_from(args.times).unwrap_or(1);
            Ok(json!(args.text.repeat(repeat)))
        }
    }

    fn registry() -> (ToolRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new().with_call_timeout(Duration::from_millis(100));
        registry
            .register(EchoTool {
                calls: calls.clone(),
            })
            .unwrap();
        (registry, calls)
    }

    #[test]
    fn test_duplicate_registration() {
        let (mut registry, calls) = registry();
        let err = registry.register(EchoTool { calls }).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_success_applies_defaults() {
        let (registry, _) = registry();
        let result = registry
            .execute(&ToolCall::new("echo", json!({"text": "hi"})).with_id("c1"))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.data(), Some(&json!("hi")));
        assert!(result.error().is_none());
        assert_eq!(result.id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_unknown_tool_never_invokes_handler() {
        let (registry, calls) = registry();
        let err = registry
            .execute(&ToolCall::new("unknown_tool", json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::UnknownTool(name) if name == "unknown_tool"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validation_lists_every_problem() {
        let (registry, calls) = registry();
        let err = registry
            .execute(&ToolCall::new(
                "echo",
                json!({"times": "three", "style": "whisper", "volume": 11}),
            ))
            .await
            .unwrap_err();

        let AgentError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.contains("unknown parameter `volume`"));
        assert!(msg.contains("missing required parameter `text`"));
        assert!(msg.contains("`times` must be of type integer"));
        assert!(msg.contains("`style` must be one of"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_failures_become_envelopes() {
        let (registry, _) = registry();

        for text in ["boom", "panic", "slow"] {
            let result = registry
                .execute(&ToolCall::new("echo", json!({"text": text})))
                .await
                .unwrap();
            assert!(!result.is_success(), "{text} should fail");
            assert!(result.data().is_none());
            assert!(result.error().is_some_and(|e| !e.is_empty()));
        }

        let result = registry
            .execute(&ToolCall::new("echo", json!({"text": "boom"})))
            .await
            .unwrap();
        assert_eq!(result.error(), Some("echo exploded"));
        assert_eq!(result.observation(), "The action failed: echo exploded");
    }

    #[tokio::test]
    async fn test_exactly_one_of_data_or_error() {
        let (registry, _) = registry();
        let cases = [
            json!({"text": "ok"}),
            json!({"text": "ok", "times": 3, "style": "loud"}),
            json!({"text": "boom"}),
            json!({"text": "panic"}),
            json!({"text": 5}),
            json!({}),
            json!("not an object"),
        ];

        for args in cases {
            if let Ok(result) = registry.execute(&ToolCall::new("echo", args)).await {
                assert_ne!(result.data().is_some(), result.error().is_some());
                assert_eq!(result.is_success(), result.data().is_some());
            }
        }
    }

    #[test]
    fn test_serialized_envelope_shape() {
        let ok = serde_json::to_value(ToolResult::success("echo", json!([1, 2]))).unwrap();
        assert_eq!(ok["success"], json!(true));
        assert_eq!(ok["data"], json!([1, 2]));
        assert_eq!(ok["error"], Value::Null);

        let failed = serde_json::to_value(ToolResult::failure("echo", "nope")).unwrap();
        assert_eq!(failed["success"], json!(false));
        assert_eq!(failed["data"], Value::Null);
        assert_eq!(failed["error"], json!("nope"));

        let empty = serde_json::to_value(ToolResult::success("echo", Value::Null)).unwrap();
        assert_eq!(empty["data"], json!({}));
        assert_eq!(empty["error"], Value::Null);
    }

    #[test]
    fn test_tool_call_accepts_tool_key() {
        let call: ToolCall =
            serde_json::from_str(r#"{"tool": "echo", "arguments": {"text": "hi"}}"#).unwrap();
        assert_eq!(call.name, "echo");
        assert_eq!(call.arguments.get("text"), Some(&json!("hi")));
    }

    #[test]
    fn test_function_schema() {
        let (registry, _) = registry();
        let schema = &registry.schemas()[0];
        let function = schema.to_function_schema();

        assert_eq!(function["function"]["name"], json!("echo"));
        assert_eq!(function["function"]["parameters"]["required"], json!(["text"]));
        assert_eq!(
            function["function"]["parameters"]["properties"]["style"]["enum"],
            json!(["plain", "loud"])
        );
        assert!(registry.generate_prompt_section().contains("`text` (string) (required)"));
    }
}
