//! Brave Search backend (requires an API key)

use async_trait::async_trait;
use serde::Deserialize;

use super::{SearchBackend, http_client};
use crate::error::{ResearchError, Result};
use crate::model::SearchHit;

const ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Brave caps `count` at 20
const MAX_COUNT: usize = 20;

pub struct BraveSearchBackend {
    client: reqwest::Client,
    api_key: String,
}

impl BraveSearchBackend {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ResearchError::Config("Brave API key is empty".into()));
        }
        Ok(Self {
            client: http_client()?,
            api_key,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BraveWeb {
    results: Vec<BraveResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BraveResult {
    title: String,
    url: String,
    description: String,
}

impl BraveResponse {
    fn into_hits(self, limit: usize) -> Vec<SearchHit> {
        self.web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(limit)
            .map(|r| SearchHit::new(r.title, r.description, r.url))
            .collect()
    }
}

#[async_trait]
impl SearchBackend for BraveSearchBackend {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let count = limit.clamp(1, MAX_COUNT).to_string();
        tracing::debug!(target: "web_search", query, limit, "Performing Brave search");

        let response = self
            .client
            .get(ENDPOINT)
            .query(&[("q", query), ("count", count.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "web_search", error = %e, "Brave request failed");
                ResearchError::SearchUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(target: "web_search", %status, "Brave returned error");
            return Err(ResearchError::Search(format!(
                "Brave Search returned HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: BraveResponse = response
            .json()
            .await
            .map_err(|e| ResearchError::Search(format!("Failed to parse search response: {e}")))?;
        Ok(body.into_hits(limit))
    }

    fn name(&self) -> &str {
        "brave"
    }
}
