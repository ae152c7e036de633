//! Fixed Search Backend
//!
//! For tests and offline demos. Returns a canned result list.

use async_trait::async_trait;

use super::SearchBackend;
use crate::error::{ResearchError, Result};
use crate::model::SearchHit;

/// Backend that always answers with the same hits, or the same failure
pub struct FixedSearchBackend {
    hits: Vec<SearchHit>,
    failure: Option<String>,
}

impl FixedSearchBackend {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            failure: None,
        }
    }

    /// `count` numbered hits for any query
    pub fn numbered(count: usize) -> Self {
        Self::new(
            (1..=count)
                .map(|i| {
                    SearchHit::new(
                        format!("Result {i}"),
                        format!("Snippet for result {i}"),
                        format!("https://example.com/{i}"),
                    )
                })
                .collect(),
        )
    }

    /// Backend that fails every search
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl SearchBackend for FixedSearchBackend {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if let Some(message) = &self.failure {
            return Err(ResearchError::SearchUnavailable(message.clone()));
        }
        Ok(self.hits.iter().take(limit).cloned().collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
