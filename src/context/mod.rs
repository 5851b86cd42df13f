//! Session-scoped conversation context.
//!
//! One [`SessionState`] owns the ordered message sequence for a session.
//! Turns bind their identifiers onto the state they hold locked; there is
//! no shared mutable builder across sessions, so concurrent turns on
//! different sessions cannot interfere.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use crate::types::{ChatMessage, ContentPart, FileContent, ImageContent, ToolCall};

/// The ordered message sequence for one session plus the current turn's
/// identifier binding. Ordering is append-only and preserved exactly.
#[derive(Debug, Default)]
pub struct SessionState {
    session_id: String,
    user_id: String,
    ai_id: String,
    messages: Vec<ChatMessage>,
}

impl SessionState {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            ..Default::default()
        }
    }

    /// Bind the turn's user/AI identifiers.
    pub fn bind(&mut self, user_id: &str, ai_id: &str) {
        self.user_id = user_id.to_string();
        self.ai_id = ai_id.to_string();
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn ai_id(&self) -> &str {
        &self.ai_id
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Seed the persona system message if the sequence has none yet.
    pub fn ensure_system_message(&mut self, prompt: &str) {
        let has_system = self
            .messages
            .iter()
            .any(|m| m.role == crate::types::Role::System);
        if !has_system {
            self.messages.insert(0, ChatMessage::system(prompt));
        }
    }

    /// Append the user's message with optional attachments.
    pub fn append_user_message(
        &mut self,
        text: &str,
        image: Option<ImageContent>,
        file: Option<FileContent>,
    ) {
        let mut extra = Vec::new();
        if let Some(image) = image {
            extra.push(ContentPart::Image(image));
        }
        if let Some(file) = file {
            extra.push(ContentPart::File(file));
        }
        let message = if extra.is_empty() {
            ChatMessage::user(text)
        } else {
            ChatMessage::user_with_parts(text, extra)
        };
        self.messages.push(message);
    }

    pub fn append_assistant_message(&mut self, text: &str) {
        self.messages.push(ChatMessage::assistant(text));
    }

    /// Append the assistant message that carries the model's tool-call
    /// requests, so each later tool result has its request in sequence.
    pub fn append_assistant_tool_calls(&mut self, text: &str, calls: Vec<ToolCall>) {
        self.messages.push(ChatMessage::assistant_tool_calls(text, calls));
    }

    /// Append exactly one tool result message keyed by its correlation id.
    pub fn append_tool_result(
        &mut self,
        correlation_id: &str,
        result: serde_json::Value,
        is_error: bool,
    ) {
        self.messages
            .push(ChatMessage::tool_result(correlation_id, result, is_error));
    }

    /// Append a new system-role message (search findings, source lists).
    pub fn append_system_message(&mut self, text: &str) {
        self.messages.push(ChatMessage::system(text));
    }

    /// Fold enhancement text into the existing system message. When the
    /// sequence has no system message yet, one is created at the front.
    pub fn append_to_system_message(&mut self, extra: &str) {
        let system = self
            .messages
            .iter_mut()
            .find(|m| m.role == crate::types::Role::System);
        match system {
            Some(message) => {
                if let Some(ContentPart::Text { text }) = message
                    .content
                    .iter_mut()
                    .find(|part| matches!(part, ContentPart::Text { .. }))
                {
                    text.push_str("\n\nKnown user context:\n");
                    text.push_str(extra);
                } else {
                    message.content.push(ContentPart::Text {
                        text: format!("Known user context:\n{extra}"),
                    });
                }
            }
            None => {
                self.messages
                    .insert(0, ChatMessage::system(format!("Known user context:\n{extra}")));
            }
        }
    }

    /// Read-only view of the sequence.
    pub fn history(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Owned copy of the sequence for a model invocation.
    pub fn materialize(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }
}

/// All live sessions. A turn locks its session's entry for the turn's
/// whole duration, so concurrent turns on the same session queue rather
/// than interleave.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<SessionState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the session entry.
    pub fn get_or_create(&self, session_id: &str) -> Arc<AsyncMutex<SessionState>> {
        self.inner
            .lock()
            .expect("session store lock poisoned")
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(SessionState::new(session_id))))
            .clone()
    }

    /// The session's materialized history; empty for unknown sessions.
    pub async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        let entry = {
            self.inner
                .lock()
                .expect("session store lock poisoned")
                .get(session_id)
                .cloned()
        };
        match entry {
            Some(session) => session.lock().await.materialize(),
            None => Vec::new(),
        }
    }

    /// Discard a session's history. Returns false for unknown sessions.
    pub fn clear(&self, session_id: &str) -> bool {
        self.inner
            .lock()
            .expect("session store lock poisoned")
            .remove(session_id)
            .is_some()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("session store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn messages_keep_append_order() {
        let mut state = SessionState::new("s1");
        state.ensure_system_message("persona");
        state.append_user_message("first", None, None);
        state.append_assistant_message("second");
        state.append_user_message("third", None, None);

        let roles: Vec<Role> = state.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(state.history()[3].text(), "third");
    }

    #[test]
    fn enhancement_appends_to_existing_system_message() {
        let mut state = SessionState::new("s1");
        state.ensure_system_message("persona");
        state.append_to_system_message("likes tea");

        let text = state.history()[0].text();
        assert!(text.starts_with("persona"));
        assert!(text.contains("likes tea"));
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn enhancement_creates_system_message_when_absent() {
        let mut state = SessionState::new("s1");
        state.append_user_message("hello", None, None);
        state.append_to_system_message("likes tea");

        assert_eq!(state.history()[0].role, Role::System);
        assert!(state.history()[0].text().contains("likes tea"));
    }

    #[tokio::test]
    async fn store_clear_discards_only_known_sessions() {
        let store = SessionStore::new();
        {
            let entry = store.get_or_create("s1");
            entry.lock().await.append_user_message("hi", None, None);
        }
        assert!(!store.history("s1").await.is_empty());
        assert!(store.clear("s1"));
        assert!(!store.clear("s1"));
        assert!(store.history("s1").await.is_empty());
    }
}
