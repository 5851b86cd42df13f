//! Turn request and result types — the public surface of one processing cycle.

use std::path::PathBuf;

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::message::{ImageContent, ToolResultPayload};

/// File attachment accompanying a user turn.
///
/// `kind` is a coarse label ("image", "document", ...). When `kind` is
/// "image" and no dedicated image was supplied, the bytes are promoted to
/// image content for the model call; the dedicated field takes precedence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileData {
    pub kind: String,
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

/// One user-input-to-assistant-response request.
///
/// Missing identifiers are generated by the orchestrator with
/// globally-unique values.
#[derive(Debug, Clone, Builder)]
pub struct TurnRequest {
    #[builder(into)]
    pub input: String,
    #[builder(into)]
    pub session_id: Option<String>,
    #[builder(into)]
    pub user_id: Option<String>,
    #[builder(into)]
    pub ai_id: Option<String>,
    pub image: Option<ImageContent>,
    pub file: Option<FileData>,
}

impl TurnRequest {
    /// Shorthand for a plain-text request with no attachments or bindings.
    pub fn text(input: impl Into<String>) -> Self {
        let input: String = input.into();
        Self::builder().input(input).build()
    }

    /// Resolve the effective image for this turn: the dedicated field wins,
    /// else a file attachment of kind "image" supplies the bytes.
    pub fn effective_image(&self) -> Option<ImageContent> {
        if let Some(ref image) = self.image {
            return Some(image.clone());
        }
        match self.file {
            Some(ref file) if file.kind == "image" => Some(ImageContent {
                data: file.data.clone(),
                mime_type: file
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "image/png".to_string()),
            }),
            _ => None,
        }
    }
}

/// The single value returned to the caller for every turn, degraded or not.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub response: String,
    pub session_id: String,
    pub has_tool_calls: bool,
    pub tool_results: Vec<ToolResultPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl TurnResult {
    /// Degraded result carrying a user-facing message and an error indicator.
    pub fn degraded(
        session_id: impl Into<String>,
        response: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            response: response.into(),
            session_id: session_id.into(),
            has_tool_calls: false,
            tool_results: Vec::new(),
            error: Some(error.into()),
            log_file: None,
        }
    }
}
