//! Append-only per-session event log, flushed to a JSONL artifact per turn.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumString};

use crate::error::Result;

/// Which model invocation within a turn an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallKind {
    /// First pass, with tool definitions.
    First,
    /// Re-invocation after search escalation.
    SearchEnhanced,
    /// Second pass after tool dispatch, without tool definitions.
    Final,
}

/// One recorded step of a turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    UserInput {
        input: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_kind: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_info: Option<String>,
    },
    ModelCall {
        kind: CallKind,
        message_count: usize,
        response: String,
        tool_call_count: usize,
    },
    ToolCall {
        name: String,
        arguments: serde_json::Value,
        result: serde_json::Value,
        is_error: bool,
    },
    FinalResponse {
        response: String,
        has_tool_calls: bool,
    },
}

/// An event plus the identifiers and timestamp every entry carries.
#[derive(Debug, Clone, Serialize)]
pub struct TurnLogEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_id: String,
    pub ai_id: String,
    #[serde(flatten)]
    pub event: LogEvent,
}

/// Identifier triple shared by all entries of one turn.
#[derive(Debug, Clone)]
pub struct TurnIds {
    pub session_id: String,
    pub user_id: String,
    pub ai_id: String,
}

#[derive(Debug, Default)]
struct SessionLog {
    entries: Vec<TurnLogEntry>,
    flushed: usize,
}

/// Append-only event logger. Entries accumulate in memory in causal order
/// and are flushed to `{log_dir}/{session_id}.jsonl` once per turn.
/// Flushing never discards entries; `session_logs` replays the full
/// in-memory record.
#[derive(Debug)]
pub struct EventLogger {
    log_dir: PathBuf,
    entries: Mutex<HashMap<String, SessionLog>>,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn push(&self, ids: &TurnIds, event: LogEvent) {
        let entry = TurnLogEntry {
            timestamp: Utc::now(),
            session_id: ids.session_id.clone(),
            user_id: ids.user_id.clone(),
            ai_id: ids.ai_id.clone(),
            event,
        };
        self.entries
            .lock()
            .expect("event log lock poisoned")
            .entry(ids.session_id.clone())
            .or_default()
            .entries
            .push(entry);
    }

    pub fn log_user_input(
        &self,
        ids: &TurnIds,
        input: &str,
        file_kind: Option<&str>,
        file_info: Option<&str>,
    ) {
        self.push(
            ids,
            LogEvent::UserInput {
                input: input.to_string(),
                file_kind: file_kind.map(str::to_string),
                file_info: file_info.map(str::to_string),
            },
        );
    }

    pub fn log_model_call(
        &self,
        ids: &TurnIds,
        kind: CallKind,
        message_count: usize,
        response: &str,
        tool_call_count: usize,
    ) {
        self.push(
            ids,
            LogEvent::ModelCall {
                kind,
                message_count,
                response: response.to_string(),
                tool_call_count,
            },
        );
    }

    pub fn log_tool_call(
        &self,
        ids: &TurnIds,
        name: &str,
        arguments: &serde_json::Value,
        result: &serde_json::Value,
        is_error: bool,
    ) {
        self.push(
            ids,
            LogEvent::ToolCall {
                name: name.to_string(),
                arguments: arguments.clone(),
                result: result.clone(),
                is_error,
            },
        );
    }

    pub fn log_final_response(&self, ids: &TurnIds, response: &str, has_tool_calls: bool) {
        self.push(
            ids,
            LogEvent::FinalResponse {
                response: response.to_string(),
                has_tool_calls,
            },
        );
    }

    /// All entries recorded for a session, for replay/audit.
    pub fn session_logs(&self, session_id: &str) -> Vec<TurnLogEntry> {
        self.entries
            .lock()
            .expect("event log lock poisoned")
            .get(session_id)
            .map(|log| log.entries.clone())
            .unwrap_or_default()
    }

    /// Write the session's not-yet-flushed entries to its JSONL artifact
    /// and return the artifact path. Safe to call with no entries: the
    /// artifact is still created (possibly empty) and its path returned.
    pub fn flush(&self, session_id: &str) -> Result<PathBuf> {
        let pending: Vec<TurnLogEntry> = {
            let mut entries = self.entries.lock().expect("event log lock poisoned");
            let log = entries.entry(session_id.to_string()).or_default();
            let pending = log.entries[log.flushed..].to_vec();
            log.flushed = log.entries.len();
            pending
        };

        fs::create_dir_all(&self.log_dir)?;
        let path = self.artifact_path(session_id);
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        for entry in &pending {
            let line = serde_json::to_string(entry)?;
            writeln!(file, "{line}")?;
        }
        Ok(path)
    }

    fn artifact_path(&self, session_id: &str) -> PathBuf {
        // Session ids are caller-supplied; keep the artifact name to a safe charset.
        let safe: String = session_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Path::new(&self.log_dir).join(format!("{safe}.jsonl"))
    }
}
