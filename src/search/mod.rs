//! Web-search collaborator used for uncertainty escalation.

use async_trait::async_trait;
use serde::Deserialize;
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::{PalaverError, Result};

/// Search depth requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

/// One source attribution from a search.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Outcome of a search: an optional synthesized answer plus sources.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub answer: Option<String>,
    pub results: Vec<SearchHit>,
}

/// External search provider seam. Escalation through this trait is
/// best-effort; callers log failures and continue.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
        max_results: u32,
        include_answer: bool,
    ) -> Result<SearchOutcome>;
}

const TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Tavily search client.
pub struct TavilySearch {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| TAVILY_BASE_URL.to_string()),
            client,
        }
    }

    /// Build a client from `TAVILY_API_KEY`. A missing credential is a
    /// normal condition (search escalation is simply disabled), not a fault.
    pub fn from_env() -> Option<Self> {
        std::env::var("TAVILY_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(|key| Self::new(key, None))
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
        max_results: u32,
        include_answer: bool,
    ) -> Result<SearchOutcome> {
        let url = format!("{}/search", self.base_url);
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": depth.to_string(),
            "max_results": max_results,
            "include_answer": include_answer,
        });

        debug!(query, depth = %depth, "tavily search");

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(PalaverError::provider(
                "tavily",
                format!("search failed (status {status}): {body_text}"),
            ));
        }

        let data: TavilyResponse = resp.json().await?;
        Ok(SearchOutcome {
            answer: data.answer.filter(|a| !a.is_empty()),
            results: data.results,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}
