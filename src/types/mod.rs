//! Core data types: messages, turn requests, turn results.

pub mod message;
pub mod turn;

pub use message::{
    ChatMessage, ContentPart, FileContent, ImageContent, Role, ToolCall, ToolResultPayload,
};
pub use turn::{FileData, TurnRequest, TurnResult};
