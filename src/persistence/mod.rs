//! Chat-history persistence collaborator seam.
//!
//! Durability of chat history is best-effort from the orchestrator's
//! standpoint: persistence errors are logged and the turn continues.

use async_trait::async_trait;

use crate::error::Result;

/// External persistence service for chat messages and session metadata.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist one message. Awaited before the turn proceeds — ordering
    /// matters for audit correctness.
    async fn save_message(
        &self,
        session_id: &str,
        user_id: &str,
        role: &str,
        content: &str,
        content_type: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<()>;

    /// Refresh session metadata (title, last message, last message time).
    async fn update_session(
        &self,
        session_id: &str,
        user_id: &str,
        title: Option<&str>,
        last_message: Option<&str>,
        last_message_time: Option<&str>,
    ) -> Result<()>;
}
