//! The turn orchestrator: one assistant coordinating context, model,
//! tools, search escalation, persistence, and logging.

pub mod uncertainty;

mod turn;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::AssistantConfig;
use crate::context::SessionStore;
use crate::error::{PalaverError, Result};
use crate::logger::{EventLogger, TurnLogEntry};
use crate::memory::MemoryProvider;
use crate::model::{ChatModel, OpenAiChatModel};
use crate::persistence::ChatStore;
use crate::search::{SearchProvider, TavilySearch};
use crate::tools::builtin::default_tools;
use crate::tools::{Tool, ToolRegistry};
use crate::types::ChatMessage;

/// Coordinates complete conversational turns.
///
/// The registry and model connection are shared, read-mostly, across
/// concurrent turns; each session's message sequence is exclusively owned
/// by the turn currently holding its lock.
pub struct Assistant {
    config: AssistantConfig,
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    store: Option<Arc<dyn ChatStore>>,
    memory: Option<Arc<dyn MemoryProvider>>,
    search: Option<Arc<dyn SearchProvider>>,
    logger: EventLogger,
    sessions: SessionStore,
    closed: AtomicBool,
}

impl Assistant {
    /// Create an assistant around a model caller, with the default tool
    /// set registered and no external collaborators.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self::with_config_and_model(AssistantConfig::default(), model)
    }

    /// Create an assistant from environment configuration: an OpenAI
    /// chat model (key required) and, when credentials allow, a Tavily
    /// search client. A missing search credential is a normal condition.
    pub fn from_env() -> Result<Self> {
        let config = AssistantConfig::from_env();
        let api_key = config.openai_api_key.clone().ok_or_else(|| {
            PalaverError::Configuration("OPENAI_API_KEY is not set".to_string())
        })?;
        let model = Arc::new(OpenAiChatModel::new(
            config.model.clone(),
            api_key,
            config.openai_base_url.clone(),
        ));

        let search: Option<Arc<dyn SearchProvider>> = match config.tavily_api_key.clone() {
            Some(key) if !key.is_empty() => Some(Arc::new(TavilySearch::new(key, None))),
            _ => {
                info!("no search credential configured; uncertainty escalation disabled");
                None
            }
        };

        let mut assistant = Self::with_config_and_model(config, model);
        assistant.search = search;
        Ok(assistant)
    }

    fn with_config_and_model(config: AssistantConfig, model: Arc<dyn ChatModel>) -> Self {
        let registry = Arc::new(ToolRegistry::new());
        for tool in default_tools() {
            registry
                .register(tool)
                .expect("default tool names are unique");
        }
        let logger = EventLogger::new(config.log_dir.clone());
        Self {
            config,
            model,
            registry,
            store: None,
            memory: None,
            search: None,
            logger,
            sessions: SessionStore::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the configuration (also repoints the log directory).
    pub fn with_config(mut self, config: AssistantConfig) -> Self {
        self.logger = EventLogger::new(config.log_dir.clone());
        self.config = config;
        self
    }

    /// Attach the persistence collaborator.
    pub fn with_store(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach the memory-enhancement collaborator.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryProvider>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Attach the search collaborator.
    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    /// Register an additional tool. Intended for startup, before turns run.
    pub fn register_tool(&self, tool: Arc<dyn Tool>) -> Result<()> {
        self.registry.register(tool)
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// The session's materialized history; empty for unknown sessions.
    /// Idempotent between turns.
    pub async fn conversation_history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.sessions.history(session_id).await
    }

    /// All log entries recorded for a session.
    pub fn session_logs(&self, session_id: &str) -> Vec<TurnLogEntry> {
        self.logger.session_logs(session_id)
    }

    /// Discard a session's history. Returns false for unknown sessions.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.clear(session_id)
    }

    /// Release held resources (the model connection). Idempotent.
    pub async fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.model.shutdown().await;
            info!("assistant shut down");
        }
    }
}
