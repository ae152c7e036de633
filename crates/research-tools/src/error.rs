//! Error Types for Research Tools

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResearchError>;

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Search error: {0}")]
    Search(String),

    #[error("Search backend unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Note store error: {0}")]
    NoteStore(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ResearchError> for AgentError {
    fn from(err: ResearchError) -> Self {
        match err {
            ResearchError::UnsupportedFormat(_) | ResearchError::Extraction(_) => {
                AgentError::Extraction(err.to_string())
            }
            ResearchError::InvalidInput(msg) => AgentError::Validation(msg),
            ResearchError::Config(msg) => AgentError::Config(msg),
            ResearchError::Io(e) => AgentError::Io(e),
            ResearchError::Serialization(e) => AgentError::Json(e),
            other => AgentError::ToolExecution(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_error_kind() {
        let err: AgentError = ResearchError::Extraction("empty".into()).into();
        assert!(matches!(err, AgentError::Extraction(_)));

        let err: AgentError = ResearchError::Search("HTTP 500".into()).into();
        assert!(matches!(err, AgentError::ToolExecution(msg) if msg.contains("HTTP 500")));

        let err: AgentError = ResearchError::InvalidInput("blank title".into()).into();
        assert!(matches!(err, AgentError::Validation(_)));
    }
}
