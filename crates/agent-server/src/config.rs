//! Server Configuration
//!
//! Everything the binary reads from the environment besides the provider
//! profile, which `agent_runtime::ProviderConfig` resolves on its own.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use agent_core::{AgentError, Result, ToolAccess};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Directory `/analyze-document/{filename}` reads from
    pub upload_dir: PathBuf,
    /// JSON-lines mirror for notes; in-memory only when unset
    pub notes_file: Option<PathBuf>,
    pub react_max_rounds: usize,
    pub tool_timeout: Duration,
    pub tool_access: ToolAccess,
    /// Enables Brave instead of DuckDuckGo for `web_search`
    pub brave_api_key: Option<String>,
    pub max_document_chars: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".into(),
            upload_dir: PathBuf::from("uploads"),
            notes_file: None,
            react_max_rounds: 6,
            tool_timeout: agent_core::tool::DEFAULT_TOOL_TIMEOUT,
            tool_access: ToolAccess::default(),
            brave_api_key: None,
            max_document_chars: research_tools::document::DEFAULT_MAX_CHARS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let react_max_rounds = parse_or(get("REACT_MAX_ROUNDS"), "REACT_MAX_ROUNDS", defaults.react_max_rounds)?;
        if react_max_rounds == 0 {
            return Err(AgentError::Config("REACT_MAX_ROUNDS must be at least 1".into()));
        }

        let tool_timeout = parse_or(get("TOOL_TIMEOUT_SECS"), "TOOL_TIMEOUT_SECS", defaults.tool_timeout.as_secs())?;

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            upload_dir: get("UPLOAD_DIR").map_or(defaults.upload_dir, PathBuf::from),
            notes_file: get("NOTES_FILE").map(PathBuf::from),
            react_max_rounds,
            tool_timeout: Duration::from_secs(tool_timeout.max(1)),
            tool_access: get("TOOL_ACCESS")
                .map(|v| ToolAccess::from_str(&v))
                .transpose()?
                .unwrap_or(defaults.tool_access),
            brave_api_key: get("BRAVE_API_KEY"),
            max_document_chars: parse_or(
                get("MAX_DOCUMENT_CHARS"),
                "MAX_DOCUMENT_CHARS",
                defaults.max_document_chars,
            )?,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    value.map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|_| AgentError::Config(format!("{key} must be a number, got '{raw}'")))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.react_max_rounds, 6);
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
        assert_eq!(config.tool_access, ToolAccess::StrategyGated);
        assert!(config.notes_file.is_none());
        assert!(config.brave_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("REACT_MAX_ROUNDS", "3"),
            ("TOOL_TIMEOUT_SECS", "5"),
            ("TOOL_ACCESS", "always"),
            ("NOTES_FILE", "notes.jsonl"),
            ("BRAVE_API_KEY", "  "),
        ])
        .unwrap();
        assert_eq!(config.react_max_rounds, 3);
        assert_eq!(config.tool_timeout, Duration::from_secs(5));
        assert_eq!(config.tool_access, ToolAccess::Always);
        assert_eq!(config.notes_file, Some(PathBuf::from("notes.jsonl")));
        assert!(config.brave_api_key.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("REACT_MAX_ROUNDS", "many")]), Err(AgentError::Config(_))));
        assert!(matches!(config(&[("REACT_MAX_ROUNDS", "0")]), Err(AgentError::Config(_))));
        assert!(matches!(config(&[("TOOL_ACCESS", "sometimes")]), Err(AgentError::Config(_))));
    }
}
