//! Web Search Backends
//!
//! Abstractions and implementations for search providers.

mod brave;
mod duckduckgo;
mod fixed;

pub use brave::BraveSearchBackend;
pub use duckduckgo::DuckDuckGoBackend;
pub use fixed::FixedSearchBackend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::SearchHit;

/// Default request timeout for search APIs
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("research-agent/", env!("CARGO_PKG_VERSION"));

/// Search backend trait (Strategy pattern)
///
/// Implementations return at most `limit` hits and report network or
/// provider failures as errors, never as an empty success.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Backend name
    fn name(&self) -> &str;
}

/// Brave when an API key is configured, otherwise the keyless DuckDuckGo API
pub fn backend_from_key(brave_api_key: Option<&str>) -> Result<Arc<dyn SearchBackend>> {
    match brave_api_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => Ok(Arc::new(BraveSearchBackend::new(key)?)),
        None => Ok(Arc::new(DuckDuckGoBackend::new()?)),
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(SEARCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| crate::error::ResearchError::Config(format!("HTTP client: {e}")))
}
