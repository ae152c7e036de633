//! DuckDuckGo Instant Answer backend (keyless)

use async_trait::async_trait;
use serde::Deserialize;

use super::{SearchBackend, http_client};
use crate::error::{ResearchError, Result};
use crate::model::SearchHit;

const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com/";

pub struct DuckDuckGoBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoBackend {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.into(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InstantAnswer {
    #[serde(rename = "Heading")]
    heading: String,
    #[serde(rename = "AbstractText")]
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    #[serde(rename = "RelatedTopics")]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Result {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

impl InstantAnswer {
    fn into_hits(self, limit: usize) -> Vec<SearchHit> {
        let mut hits = Vec::new();
        if !self.abstract_text.is_empty() {
            let title = if self.heading.is_empty() {
                "Summary".to_string()
            } else {
                self.heading
            };
            hits.push(SearchHit::new(title, self.abstract_text, self.abstract_url));
        }
        collect_topics(&self.related_topics, &mut hits, limit);
        hits.truncate(limit);
        hits
    }
}

fn collect_topics(topics: &[RelatedTopic], hits: &mut Vec<SearchHit>, limit: usize) {
    for topic in topics {
        if hits.len() >= limit {
            return;
        }
        match topic {
            RelatedTopic::Result { text, first_url } if !text.is_empty() && !first_url.is_empty() => {
                // Topic text reads "Title - description"
                let title = text.split(" - ").next().unwrap_or(text).trim();
                hits.push(SearchHit::new(title, text.as_str(), first_url.as_str()));
            }
            RelatedTopic::Result { .. } => {}
            RelatedTopic::Group { topics } => collect_topics(topics, hits, limit),
        }
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoBackend {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        tracing::debug!(target: "web_search", query, limit, "Performing DuckDuckGo search");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "web_search", error = %e, "DuckDuckGo request failed");
                ResearchError::SearchUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target: "web_search", %status, "DuckDuckGo returned error");
            return Err(ResearchError::Search(format!("DuckDuckGo returned status {status}")));
        }

        // The API answers with `application/x-javascript`
        let body = response.text().await?;
        let answer: InstantAnswer = serde_json::from_str(&body)
            .map_err(|e| ResearchError::Search(format!("Failed to parse search response: {e}")))?;

        Ok(answer.into_hits(limit))
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}
