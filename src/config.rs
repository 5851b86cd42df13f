//! Assistant configuration (code overrides > environment > defaults).

use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;

use crate::assistant::uncertainty;
use crate::search::SearchDepth;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, reliable assistant. Answer concisely, \
and use the available tools when a question calls for them.";

/// Configuration for an [`Assistant`](crate::assistant::Assistant).
///
/// The turn deadline exists because the caller sits at a request/response
/// boundary with its own stricter timeout; a degraded-but-prompt answer
/// beats a hung request. The memory timeout is strictly shorter and bounds
/// only the enhancement call.
#[derive(Debug, Clone, Builder)]
pub struct AssistantConfig {
    #[builder(into, default = "gpt-4o".to_string())]
    pub model: String,

    #[builder(into)]
    pub openai_api_key: Option<String>,

    #[builder(into)]
    pub openai_base_url: Option<String>,

    #[builder(into)]
    pub tavily_api_key: Option<String>,

    #[builder(into, default = DEFAULT_SYSTEM_PROMPT.to_string())]
    pub system_prompt: String,

    /// Hard wall-clock deadline for a whole turn.
    #[builder(default = Duration::from_secs(25))]
    pub turn_deadline: Duration,

    /// Bound on the best-effort memory enhancement call.
    #[builder(default = Duration::from_secs(3))]
    pub memory_timeout: Duration,

    #[builder(default = 5)]
    pub search_max_results: u32,

    #[builder(default = SearchDepth::Basic)]
    pub search_depth: SearchDepth,

    /// Maximum length of a derived search query, in bytes.
    #[builder(default = 100)]
    pub query_truncation_limit: usize,

    /// User ids equal to or prefixed by this sentinel skip persistence
    /// and memory enhancement entirely.
    #[builder(into, default = "anonymous".to_string())]
    pub anonymous_prefix: String,

    #[builder(into, default = PathBuf::from("logs"))]
    pub log_dir: PathBuf,

    /// Lowercase substring markers that flag an unconfident answer.
    #[builder(default = uncertainty::default_phrases())]
    pub uncertainty_phrases: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AssistantConfig {
    /// Load from environment variables (`OPENAI_API_KEY`, `OPENAI_BASE_URL`,
    /// `TAVILY_API_KEY`, `PALAVER_MODEL`, `PALAVER_LOG_DIR`), reading a
    /// `.env` file when present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::builder()
            .maybe_model(std::env::var("PALAVER_MODEL").ok())
            .maybe_openai_api_key(std::env::var("OPENAI_API_KEY").ok())
            .maybe_openai_base_url(std::env::var("OPENAI_BASE_URL").ok())
            .maybe_tavily_api_key(std::env::var("TAVILY_API_KEY").ok())
            .maybe_log_dir(std::env::var("PALAVER_LOG_DIR").ok().map(PathBuf::from))
            .build()
    }

    pub(crate) fn is_anonymous(&self, user_id: &str) -> bool {
        user_id.starts_with(&self.anonymous_prefix)
    }
}
