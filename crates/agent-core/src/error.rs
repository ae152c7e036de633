//! Error Types

use std::time::Duration;

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider returned an error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Rate limited by the provider
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication with the provider failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A provider call or tool call ran past its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Tool not found in registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool registered twice under the same name
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// Tool arguments rejected by the parameter schema
    #[error("Validation error: {0}")]
    Validation(String),

    /// Tool handler failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Unrecognized reasoning strategy
    #[error("Unsupported reasoning strategy: {0}")]
    UnsupportedStrategy(String),

    /// Document text could not be extracted
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Parse error (e.g., provider payload parsing)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Whether the failure came from the model transport
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AgentError::Provider(_)
                | AgentError::ProviderUnavailable(_)
                | AgentError::RateLimited(_)
                | AgentError::Auth(_)
                | AgentError::Timeout(_)
        )
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ProviderUnavailable(_)
                | AgentError::RateLimited(_)
                | AgentError::Timeout(_)
                | AgentError::Io(_)
        )
    }

    /// Whether a ReAct round can record this failure and keep going
    pub fn is_recoverable(&self) -> bool {
        self.is_retryable() || (self.is_transport() && !matches!(self, AgentError::Auth(_)))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            AgentError::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            AgentError::RateLimited(_) => {
                "You've made too many requests. Please wait a moment.".into()
            }
            AgentError::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            AgentError::Timeout(_) => "The request timed out. Please try again.".into(),
            AgentError::UnknownTool(name) => format!("The tool '{name}' is not available."),
            AgentError::Validation(msg) => format!("Invalid tool input: {msg}"),
            AgentError::ToolExecution(msg) => format!("Tool error: {msg}"),
            AgentError::UnsupportedStrategy(name) => format!(
                "Unknown reasoning type '{name}'. Use direct, chain_of_thought or react."
            ),
            AgentError::Extraction(msg) => format!("Could not read the document: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(AgentError::Auth("bad key".into()).is_transport());
        assert!(AgentError::Timeout(Duration::from_secs(1)).is_transport());
        assert!(!AgentError::UnknownTool("x".into()).is_transport());

        assert!(AgentError::RateLimited("slow down".into()).is_retryable());
        assert!(!AgentError::Auth("bad key".into()).is_retryable());
        assert!(AgentError::Provider("empty completion".into()).is_recoverable());
        assert!(!AgentError::Auth("bad key".into()).is_recoverable());
        assert!(!AgentError::Config("no model".into()).is_recoverable());
    }
}
