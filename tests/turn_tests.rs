//! End-to-end turn orchestration tests with scripted collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use palaver::assistant::Assistant;
use palaver::config::AssistantConfig;
use palaver::error::{PalaverError, Result};
use palaver::logger::{CallKind, LogEvent};
use palaver::memory::{MemoryEnhancement, MemoryProvider};
use palaver::model::{ChatModel, ModelReply, ToolDefinition};
use palaver::persistence::ChatStore;
use palaver::search::{SearchDepth, SearchHit, SearchOutcome, SearchProvider};
use palaver::types::{ChatMessage, ContentPart, Role, ToolCall, TurnRequest};

struct RecordedCall {
    messages: Vec<ChatMessage>,
    with_tools: bool,
}

/// Model double that pops scripted replies and records every invocation.
struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    fn new(replies: Vec<ModelReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call(&self, index: usize) -> RecordedCall {
        let calls = self.calls.lock().unwrap();
        RecordedCall {
            messages: calls[index].messages.clone(),
            with_tools: calls[index].with_tools,
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            with_tools: tools.is_some_and(|t| !t.is_empty()),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PalaverError::provider("scripted", "no scripted reply left"))
    }
}

/// Model double that never answers, for deadline tests.
struct StalledModel;

#[async_trait]
impl ChatModel for StalledModel {
    fn model_id(&self) -> &str {
        "stalled"
    }

    async fn invoke(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(ModelReply::default())
    }
}

#[derive(Default)]
struct CountingStore {
    saves: AtomicUsize,
    updates: AtomicUsize,
    roles: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatStore for CountingStore {
    async fn save_message(
        &self,
        _session_id: &str,
        _user_id: &str,
        role: &str,
        _content: &str,
        _content_type: &str,
        _metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.roles.lock().unwrap().push(role.to_string());
        Ok(())
    }

    async fn update_session(
        &self,
        _session_id: &str,
        _user_id: &str,
        title: Option<&str>,
        _last_message: Option<&str>,
        _last_message_time: Option<&str>,
    ) -> Result<()> {
        assert!(title.is_some());
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct CountingMemory {
    calls: AtomicUsize,
}

#[async_trait]
impl MemoryProvider for CountingMemory {
    async fn enhance(
        &self,
        _user_id: &str,
        _user_message: &str,
        _session_id: &str,
    ) -> Result<MemoryEnhancement> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryEnhancement {
            context_enhancement: "User likes tea".to_string(),
        })
    }
}

struct MockSearch {
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
    outcome: Result<SearchOutcome>,
}

impl MockSearch {
    fn answering(answer: &str, hits: Vec<SearchHit>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            outcome: Ok(SearchOutcome {
                answer: Some(answer.to_string()),
                results: hits,
            }),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            outcome: Err(PalaverError::provider("tavily", "service unavailable")),
        })
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(
        &self,
        query: &str,
        _depth: SearchDepth,
        _max_results: u32,
        _include_answer: bool,
    ) -> Result<SearchOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        match &self.outcome {
            Ok(outcome) => Ok(outcome.clone()),
            Err(_) => Err(PalaverError::provider("tavily", "service unavailable")),
        }
    }
}

fn text_reply(text: &str) -> ModelReply {
    ModelReply {
        content: text.to_string(),
        tool_calls: Vec::new(),
    }
}

fn tool_reply(name: &str, arguments: serde_json::Value, id: &str) -> ModelReply {
    ModelReply {
        content: String::new(),
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }],
    }
}

fn test_config(log_dir: &std::path::Path) -> AssistantConfig {
    AssistantConfig::builder().log_dir(log_dir.to_path_buf()).build()
}

fn request(input: &str, session_id: &str, user_id: &str) -> TurnRequest {
    TurnRequest::builder()
        .input(input)
        .session_id(session_id)
        .user_id(user_id)
        .ai_id("ai_test")
        .build()
}

#[tokio::test]
async fn scenario_direct_answer_without_tools() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![text_reply("2 + 2 equals 4.")]);
    let assistant = Assistant::new(model.clone()).with_config(test_config(tmp.path()));

    let result = assistant
        .process_turn(request("What's 2+2?", "s-direct", "user_1"))
        .await;

    assert_eq!(result.response, "2 + 2 equals 4.");
    assert!(!result.has_tool_calls);
    assert!(result.tool_results.is_empty());
    assert!(result.error.is_none());
    assert!(result.log_file.is_some());
    assert_eq!(model.call_count(), 1);
    assert!(model.call(0).with_tools, "first call carries tool definitions");

    let history = assistant.conversation_history("s-direct").await;
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);

    // Idempotent between turns.
    let again = assistant.conversation_history("s-direct").await;
    assert_eq!(history, again);
}

#[tokio::test]
async fn scenario_weather_tool_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        tool_reply(
            "get_weather",
            serde_json::json!({"city": "Singapore", "date": "tomorrow"}),
            "",
        ),
        text_reply("Tomorrow in Singapore expect mild weather."),
    ]);
    let assistant = Assistant::new(model.clone()).with_config(test_config(tmp.path()));

    let result = assistant
        .process_turn(request(
            "What's the weather in Singapore tomorrow?",
            "s-weather",
            "user_1",
        ))
        .await;

    assert!(result.has_tool_calls);
    assert_eq!(result.tool_results.len(), 1);
    assert_eq!(result.tool_results[0].tool_call_id, "call_1");
    assert!(!result.tool_results[0].is_error);
    assert_eq!(result.tool_results[0].result["city"], "Singapore");
    assert_eq!(result.response, "Tomorrow in Singapore expect mild weather.");
    assert!(result.error.is_none());

    assert_eq!(model.call_count(), 2);
    assert!(model.call(0).with_tools);
    assert!(!model.call(1).with_tools, "second call omits tool definitions");

    // Exactly one tool-result message, keyed by the synthesized id.
    let history = assistant.conversation_history("s-weather").await;
    let tool_results: Vec<_> = history
        .iter()
        .filter(|m| m.role == Role::Tool)
        .flat_map(|m| m.content.iter())
        .filter_map(|part| match part {
            ContentPart::ToolResult(tr) => Some(tr),
            _ => None,
        })
        .collect();
    assert_eq!(tool_results.len(), 1);
    assert_eq!(tool_results[0].tool_call_id, "call_1");
}

#[tokio::test]
async fn scenario_uncertainty_triggers_search_escalation() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        text_reply("I don't have real-time information about that."),
        text_reply("Based on the latest search, rain is expected."),
    ]);
    let search = MockSearch::answering(
        "Rain expected across the region.",
        vec![
            SearchHit {
                title: "Weather Service".to_string(),
                url: "https://weather.example".to_string(),
            },
            SearchHit {
                title: "News".to_string(),
                url: "https://news.example".to_string(),
            },
        ],
    );
    let assistant = Assistant::new(model.clone())
        .with_config(test_config(tmp.path()))
        .with_search(search.clone());

    let result = assistant
        .process_turn(request("Will it rain tomorrow?", "s-search", "user_1"))
        .await;

    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(search.queries.lock().unwrap()[0], "Will it rain tomorrow?");
    assert_eq!(result.response, "Based on the latest search, rain is expected.");
    assert!(!result.has_tool_calls);
    assert!(result.error.is_none());

    // The re-invocation saw the injected search findings.
    assert_eq!(model.call_count(), 2);
    let second = model.call(1);
    assert!(!second.with_tools);
    let injected = second
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .any(|m| m.text().contains("Rain expected across the region."));
    assert!(injected, "search answer should be injected as a system message");

    // Logged as a distinct call kind.
    let kinds: Vec<CallKind> = assistant
        .session_logs("s-search")
        .iter()
        .filter_map(|entry| match &entry.event {
            LogEvent::ModelCall { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![CallKind::First, CallKind::SearchEnhanced]);
}

#[tokio::test]
async fn search_failure_keeps_original_response() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![text_reply("Sorry, I cannot access current data.")]);
    let search = MockSearch::failing();
    let assistant = Assistant::new(model.clone())
        .with_config(test_config(tmp.path()))
        .with_search(search.clone());

    let result = assistant
        .process_turn(request("What's the latest?", "s-searchfail", "user_1"))
        .await;

    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.response, "Sorry, I cannot access current data.");
    assert!(result.error.is_none(), "search escalation is best-effort");
    assert_eq!(model.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn scenario_deadline_returns_degraded_result() {
    let tmp = tempfile::tempdir().unwrap();
    let assistant = Assistant::new(Arc::new(StalledModel)).with_config(test_config(tmp.path()));

    let result = assistant
        .process_turn(request("hang forever", "s-timeout", "user_1"))
        .await;

    assert_eq!(result.session_id, "s-timeout");
    assert!(result.error.is_some());
    assert!(result.response.contains("timed out"));
    assert!(!result.has_tool_calls);
}

#[tokio::test]
async fn scenario_unknown_tool_yields_structured_error() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        tool_reply("launch_rockets", serde_json::json!({}), "call_9"),
        text_reply("I could not complete that."),
    ]);
    let assistant = Assistant::new(model.clone()).with_config(test_config(tmp.path()));

    let result = assistant
        .process_turn(request("do the thing", "s-unknown", "user_1"))
        .await;

    assert!(result.has_tool_calls);
    assert_eq!(result.tool_results.len(), 1);
    assert!(result.tool_results[0].is_error);
    assert!(result.tool_results[0].result["error"]
        .as_str()
        .unwrap()
        .contains("launch_rockets"));
    assert_eq!(result.response, "I could not complete that.");
    assert!(result.error.is_none(), "turn completes normally");
    assert_eq!(model.call_count(), 2, "second model call still happens");
}

#[tokio::test]
async fn anonymous_users_skip_persistence_and_memory() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![text_reply("hello")]);
    let store = Arc::new(CountingStore::default());
    let memory = Arc::new(CountingMemory::default());
    let assistant = Assistant::new(model)
        .with_config(test_config(tmp.path()))
        .with_store(store.clone())
        .with_memory(memory.clone());

    let result = assistant
        .process_turn(request("hi", "s-anon", "anonymous_guest"))
        .await;

    assert!(result.error.is_none());
    assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    assert_eq!(store.updates.load(Ordering::SeqCst), 0);
    assert_eq!(memory.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn named_users_persist_and_get_memory_enhancement() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![text_reply("hello")]);
    let store = Arc::new(CountingStore::default());
    let memory = Arc::new(CountingMemory::default());
    let assistant = Assistant::new(model.clone())
        .with_config(test_config(tmp.path()))
        .with_store(store.clone())
        .with_memory(memory.clone());

    let result = assistant
        .process_turn(request("hi there", "s-named", "user_42"))
        .await;

    assert!(result.error.is_none());
    // User message + assistant response.
    assert_eq!(store.saves.load(Ordering::SeqCst), 2);
    // Session metadata refresh happens on the user side only.
    assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    assert_eq!(memory.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *store.roles.lock().unwrap(),
        vec!["user_42".to_string(), "user_42_aiResponse".to_string()]
    );

    // The enhancement landed in the system message the model saw.
    let first = model.call(0);
    assert!(first.messages[0].text().contains("User likes tea"));
}

#[tokio::test]
async fn message_ordering_is_preserved_across_turns() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![text_reply("first answer"), text_reply("second answer")]);
    let assistant = Assistant::new(model).with_config(test_config(tmp.path()));

    assistant
        .process_turn(request("first question", "s-order", "user_1"))
        .await;
    assistant
        .process_turn(request("second question", "s-order", "user_1"))
        .await;

    let history = assistant.conversation_history("s-order").await;
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(history[1].text(), "first question");
    assert_eq!(history[2].text(), "first answer");
    assert_eq!(history[3].text(), "second question");
    assert_eq!(history[4].text(), "second answer");
}

#[tokio::test]
async fn file_attachment_of_image_kind_is_promoted() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![text_reply("nice picture")]);
    let assistant = Assistant::new(model.clone()).with_config(test_config(tmp.path()));

    let request = TurnRequest::builder()
        .input("what is this?")
        .session_id("s-image")
        .user_id("user_1")
        .file(palaver::types::FileData {
            kind: "image".to_string(),
            data: vec![0x89, 0x50, 0x4e, 0x47],
            mime_type: Some("image/png".to_string()),
            info: Some("photo.png".to_string()),
        })
        .build();
    let result = assistant.process_turn(request).await;

    assert!(result.error.is_none());
    let sent = model.call(0);
    let user_message = sent
        .messages
        .iter()
        .find(|m| m.role == Role::User)
        .expect("user message");
    let has_image = user_message
        .content
        .iter()
        .any(|part| matches!(part, ContentPart::Image(img) if img.mime_type == "image/png"));
    assert!(has_image, "image-kind file should become image content");
}

#[tokio::test]
async fn generated_session_id_is_returned_for_bare_requests() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![text_reply("hello")]);
    let assistant = Assistant::new(model).with_config(test_config(tmp.path()));

    let result = assistant.process_turn(TurnRequest::text("hi")).await;

    assert!(result.error.is_none());
    assert!(!result.session_id.is_empty());
    assert!(!assistant.conversation_history(&result.session_id).await.is_empty());
}

#[tokio::test]
async fn clear_session_discards_history() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![text_reply("hello")]);
    let assistant = Assistant::new(model).with_config(test_config(tmp.path()));

    assistant.process_turn(request("hi", "s-clear", "user_1")).await;
    assert!(assistant.clear_session("s-clear"));
    assert!(!assistant.clear_session("s-clear"));
    assert!(assistant.conversation_history("s-clear").await.is_empty());
}

#[tokio::test]
async fn model_fault_degrades_instead_of_propagating() {
    let tmp = tempfile::tempdir().unwrap();
    // No scripted replies: the first invocation errors.
    let model = ScriptedModel::new(vec![]);
    let assistant = Assistant::new(model).with_config(test_config(tmp.path()));

    let result = assistant.process_turn(request("hi", "s-fault", "user_1")).await;

    assert!(result.error.is_some());
    assert!(result.response.contains("Something went wrong"));
    assert_eq!(result.session_id, "s-fault");
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![]);
    let assistant = Assistant::new(model).with_config(test_config(tmp.path()));

    assistant.shutdown().await;
    assistant.shutdown().await;
}
