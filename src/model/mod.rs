//! Model invocation seam.
//!
//! The orchestrator talks to the LLM through [`ChatModel`]; the concrete
//! transport lives in [`openai`].

pub mod openai;

pub use openai::OpenAiChatModel;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, ToolCall};

/// Tool definition presented to the model.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The model's answer to one invocation: textual content plus any
/// requested tool calls.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Single-operation model caller.
///
/// Implementations must surface provider-level failures (rate limit,
/// network fault, malformed response) as distinct error kinds so the
/// orchestrator can degrade gracefully instead of propagating a fault.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// The model identifier served by this caller.
    fn model_id(&self) -> &str;

    /// Send the message sequence (and optional tool schemas) to the model.
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply>;

    /// Release any held connection resources. Must be idempotent.
    async fn shutdown(&self) {}
}
