//! Memory-enhancement collaborator seam.
//!
//! The ranking/selection of memories is an external concern; the
//! orchestrator only consumes the resulting context text, bounded by a
//! short timeout and dropped on expiry.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

/// Context text recalled for the current user and message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryEnhancement {
    #[serde(default)]
    pub context_enhancement: String,
}

/// External memory provider.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    async fn enhance(
        &self,
        user_id: &str,
        user_message: &str,
        session_id: &str,
    ) -> Result<MemoryEnhancement>;
}
