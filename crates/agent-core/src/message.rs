//! Conversation Messages
//!
//! Standard message format and the append-only conversation history
//! used across the agent system.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Optional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// Additional message metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Tool call ID (for tool messages and the assistant turn that requested it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool that produced or was requested by this message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Model that generated this (for assistant messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message
    pub fn tool(
        content: impl Into<String>,
        tool_name: impl Into<String>,
        tool_call_id: Option<String>,
    ) -> Self {
        Self::new(Role::Tool, content).with_metadata(MessageMetadata {
            tool_call_id,
            tool_name: Some(tool_name.into()),
            ..Default::default()
        })
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Name of the tool this message relates to, if any
    pub fn tool_name(&self) -> Option<&str> {
        self.metadata.as_ref()?.tool_name.as_deref()
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token, +4 for role overhead
        u32::try_from(self.content.len() / 4).unwrap_or(u32::MAX).saturating_add(4)
    }
}

/// Conversation history for one session.
///
/// Messages can only be appended. Nothing removes or reorders an entry
/// once it is in, so positions are stable for the life of the session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,

    /// Session-level research context (last strategy, analyzed documents, ...)
    #[serde(default)]
    context: HashMap<String, serde_json::Value>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, returning its position in the history
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Full ordered history
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Most recent messages whose estimated size fits in `max_tokens`.
    ///
    /// Always includes at least the newest message. The history itself is
    /// left untouched.
    pub fn window(&self, max_tokens: u32) -> &[Message] {
        let mut used = 0u32;
        let mut start = self.messages.len();

        while start > 0 {
            let cost = self.messages[start - 1].estimate_tokens();
            if used.saturating_add(cost) > max_tokens && start < self.messages.len() {
                break;
            }
            used = used.saturating_add(cost);
            start -= 1;
        }

        &self.messages[start..]
    }

    /// Read the research context
    pub fn context(&self) -> &HashMap<String, serde_json::Value> {
        &self.context
    }

    /// Set a research context entry
    pub fn set_context(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), value);
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");

        let tool = Message::tool("42", "calculate", Some("call-1".into()));
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.tool_name(), Some("calculate"));
    }

    #[test]
    fn test_history_preserves_append_order() {
        let mut conv = Conversation::new();
        let contents: Vec<String> = (0..25).map(|i| format!("message {i}")).collect();

        for (i, content) in contents.iter().enumerate() {
            let msg = match i % 3 {
                0 => Message::user(content),
                1 => Message::assistant(content),
                _ => Message::tool(content, "save_note", None),
            };
            assert_eq!(conv.append(msg), i);
        }

        assert_eq!(conv.len(), contents.len());
        let seen: Vec<&str> = conv.history().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(seen, contents.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_consecutive_tool_messages_allowed() {
        let mut conv = Conversation::new();
        conv.append(Message::user("Hi"));
        conv.append(Message::tool("one", "web_search", None));
        conv.append(Message::tool("two", "web_search", None));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.last().map(|m| m.role), Some(Role::Tool));
    }

    #[test]
    fn test_window_keeps_newest_without_mutating() {
        let mut conv = Conversation::new();
        for i in 0..10 {
            conv.append(Message::user("x".repeat(40 + i)));
        }

        let window = conv.window(30);
        assert!(!window.is_empty());
        assert!(window.len() < conv.len());
        assert_eq!(
            window.last().map(|m| m.content.clone()),
            conv.last().map(|m| m.content.clone())
        );
        assert_eq!(conv.len(), 10);

        assert_eq!(conv.window(u32::MAX).len(), 10);
    }

    #[test]
    fn test_context() {
        let mut conv = Conversation::new();
        conv.set_context("last_reasoning_type", serde_json::json!("react"));
        assert_eq!(
            conv.context().get("last_reasoning_type"),
            Some(&serde_json::json!("react"))
        );
    }
}
