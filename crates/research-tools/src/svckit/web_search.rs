//! Web Search Tool
//!
//! Queries the configured `SearchBackend` and returns `{title, snippet, source}` records.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use agent_core::{ParamType, ParameterSchema, Result as CoreResult, Tool, ToolArgs, ToolSchema};

use crate::error::ResearchError;
use crate::search::SearchBackend;

const DEFAULT_RESULTS: i64 = 5;
const MAX_RESULTS: i64 = 20;

pub struct WebSearchTool {
    backend: Arc<dyn SearchBackend>,
}

impl WebSearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default = "default_results")]
    num_results: i64,
}

fn default_results() -> i64 {
    DEFAULT_RESULTS
}

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "web_search".into(),
            description: "Search the web for current information. Returns a list of results with title, snippet and source URL.".into(),
            parameters: vec![
                ParameterSchema::required("query", ParamType::String, "Search query"),
                ParameterSchema::optional(
                    "num_results",
                    ParamType::Integer,
                    "Maximum number of results (1-20)",
                )
                .with_default(json!(DEFAULT_RESULTS)),
            ],
            category: Some("research".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, args: ToolArgs) -> CoreResult<Value> {
        let args: WebSearchArgs = args.parse()?;
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ResearchError::InvalidInput("query must not be empty".into()).into());
        }

        let limit = usize::try_from(args.num_results.clamp(1, MAX_RESULTS)).unwrap_or(1);
        let hits = self.backend.search(query, limit).await?;

        tracing::debug!(
            target: "web_search",
            backend = self.backend.name(),
            hits = hits.len(),
            "Search finished"
        );
        Ok(serde_json::to_value(hits)?)
    }
}

#[cfg(test)]
mod tests {
    use agent_core::{ToolCall, ToolRegistry};

    use super::*;
    use crate::search::FixedSearchBackend;

    fn registry(backend: FixedSearchBackend) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(WebSearchTool::new(Arc::new(backend)))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_num_results_limits_hits() {
        let registry = registry(FixedSearchBackend::numbered(10));
        let call = ToolCall::new("web_search", json!({"query": "rust", "num_results": 3}));

        let result = registry.execute(&call).await.unwrap();
        assert!(result.is_success());
        let hits = result.data().unwrap().as_array().unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0]["source"], "https://example.com/1");
    }

    #[tokio::test]
    async fn test_default_and_clamped_counts() {
        let registry = registry(FixedSearchBackend::numbered(30));

        let result = registry
            .execute(&ToolCall::new("web_search", json!({"query": "rust"})))
            .await
            .unwrap();
        assert_eq!(result.data().unwrap().as_array().unwrap().len(), 5);

        let result = registry
            .execute(&ToolCall::new("web_search", json!({"query": "rust", "num_results": 500})))
            .await
            .unwrap();
        assert_eq!(result.data().unwrap().as_array().unwrap().len(), 20);

        let result = registry
            .execute(&ToolCall::new("web_search", json!({"query": "rust", "num_results": 0})))
            .await
            .unwrap();
        assert_eq!(result.data().unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_is_graceful() {
        let registry = registry(FixedSearchBackend::failing("connection refused"));
        let call = ToolCall::new("web_search", json!({"query": "rust"}));

        let result = registry.execute(&call).await.unwrap();
        assert!(!result.is_success());
        assert!(result.data().is_none());
        assert!(result.error().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_blank_query_fails() {
        let registry = registry(FixedSearchBackend::numbered(3));
        let result = registry
            .execute(&ToolCall::new("web_search", json!({"query": "  "})))
            .await
            .unwrap();
        assert!(!result.is_success());
    }
}
