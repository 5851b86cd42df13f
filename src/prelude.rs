//! Convenience re-exports for common use.

pub use crate::assistant::Assistant;
pub use crate::config::AssistantConfig;
pub use crate::error::{PalaverError, Result};
pub use crate::memory::{MemoryEnhancement, MemoryProvider};
pub use crate::model::{ChatModel, ModelReply, OpenAiChatModel, ToolDefinition};
pub use crate::persistence::ChatStore;
pub use crate::search::{SearchDepth, SearchOutcome, SearchProvider};
pub use crate::tools::{FnTool, Tool, ToolArguments, ToolParameters, ToolRegistry};
pub use crate::types::{
    ChatMessage, ContentPart, Role, ToolCall, ToolResultPayload, TurnRequest, TurnResult,
};
