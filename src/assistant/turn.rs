//! The turn state machine:
//! `Init → ContextBuilt → FirstModelCall → (UncertaintyCheck →)
//! [SearchEscalation →] ToolDispatch* → SecondModelCall → Finalize → Done`.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{uncertainty, Assistant};
use crate::context::SessionState;
use crate::error::Result;
use crate::logger::{CallKind, TurnIds};
use crate::model::ModelReply;
use crate::tools::ToolExecutionContext;
use crate::types::{FileContent, ToolCall, ToolResultPayload, TurnRequest, TurnResult};
use crate::util::truncate_utf8;

const TIMEOUT_RESPONSE: &str = "Sorry, processing your request timed out. \
Please try a shorter message or try again shortly.";

const TITLE_CHARS: usize = 30;

impl Assistant {
    /// Process one complete turn. Always returns exactly one
    /// [`TurnResult`]: on deadline expiry or internal fault the result is
    /// degraded, carrying an error indicator — the turn boundary contains
    /// failures rather than propagating them.
    pub async fn process_turn(&self, request: TurnRequest) -> TurnResult {
        let ids = TurnIds {
            session_id: request
                .session_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: request
                .user_id
                .clone()
                .unwrap_or_else(|| format!("user_{}", short_id())),
            ai_id: request
                .ai_id
                .clone()
                .unwrap_or_else(|| format!("ai_{}", short_id())),
        };

        let started = Instant::now();
        info!(
            session_id = %ids.session_id,
            user_id = %ids.user_id,
            input_len = request.input.len(),
            "turn start"
        );

        let outcome =
            tokio::time::timeout(self.config.turn_deadline, self.run_turn(&request, &ids)).await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(session_id = %ids.session_id, error = %err, "turn failed");
                TurnResult::degraded(
                    ids.session_id.clone(),
                    format!("Something went wrong while processing your request: {err}"),
                    err.to_string(),
                )
            }
            Err(_) => {
                warn!(session_id = %ids.session_id, "turn deadline exceeded, abandoning in-flight work");
                TurnResult::degraded(ids.session_id.clone(), TIMEOUT_RESPONSE, "turn deadline exceeded")
            }
        };

        info!(
            session_id = %ids.session_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            has_tool_calls = result.has_tool_calls,
            degraded = result.error.is_some(),
            "turn complete"
        );
        result
    }

    async fn run_turn(&self, request: &TurnRequest, ids: &TurnIds) -> Result<TurnResult> {
        let anonymous = self.config.is_anonymous(&ids.user_id);

        // Holding the session lock for the whole turn serializes
        // concurrent turns on the same session.
        let session = self.sessions.get_or_create(&ids.session_id);
        let mut session = session.lock().await;
        session.bind(&ids.user_id, &ids.ai_id);

        self.logger.log_user_input(
            ids,
            &request.input,
            request.file.as_ref().map(|f| f.kind.as_str()),
            request.file.as_ref().and_then(|f| f.info.as_deref()),
        );

        // 1. Append the user message, attachments resolved.
        session.ensure_system_message(&self.config.system_prompt);
        let image = request.effective_image();
        let file = request
            .file
            .as_ref()
            .filter(|f| f.kind != "image")
            .map(|f| FileContent {
                data: f.data.clone(),
                kind: f.kind.clone(),
                info: f.info.clone(),
            });
        session.append_user_message(&request.input, image, file);

        // 2. Persist the user message and refresh session metadata.
        if anonymous {
            debug!(session_id = %ids.session_id, "anonymous user, skipping persistence");
        } else {
            self.persist_user_message(request, ids).await;
        }

        // 3. Best-effort memory enhancement, bounded by its own timeout.
        if !anonymous {
            self.enhance_with_memory(request, ids, &mut session).await;
        }

        // 4. First model call, with tool definitions.
        let definitions = self.registry.definitions();
        let tool_defs = (!definitions.is_empty()).then_some(definitions.as_slice());
        let call_start = Instant::now();
        let mut reply = self.model.invoke(&session.materialize(), tool_defs).await?;
        debug!(
            session_id = %ids.session_id,
            elapsed_ms = call_start.elapsed().as_millis() as u64,
            tool_calls = reply.tool_calls.len(),
            "first model call complete"
        );
        self.logger.log_model_call(
            ids,
            CallKind::First,
            session.history().len(),
            &reply.content,
            reply.tool_calls.len(),
        );

        // 5. Uncertainty check — only when the response requests no tools.
        if !reply.has_tool_calls()
            && uncertainty::is_uncertain(&reply.content, &self.config.uncertainty_phrases)
        {
            if let Some(enhanced) = self.escalate_with_search(ids, &mut session, &request.input).await
            {
                reply = enhanced;
            }
        }

        // 6. Tool dispatch loop.
        let has_tool_calls = reply.has_tool_calls();
        let mut tool_results: Vec<ToolResultPayload> = Vec::new();
        if has_tool_calls {
            let calls = resolve_correlation_ids(reply.tool_calls.clone());
            session.append_assistant_tool_calls(&reply.content, calls.clone());

            for call in &calls {
                let result = self.dispatch_tool(ids, call).await;
                session.append_tool_result(&result.tool_call_id, result.result.clone(), result.is_error);
                tool_results.push(result);
            }

            // 7. Second model call — tools are resolved, no definitions.
            reply = self.model.invoke(&session.materialize(), None).await?;
            self.logger.log_model_call(
                ids,
                CallKind::Final,
                session.history().len(),
                &reply.content,
                reply.tool_calls.len(),
            );
        }

        // 8. Finalize the context and the log.
        session.append_assistant_message(&reply.content);
        self.logger.log_final_response(ids, &reply.content, has_tool_calls);

        // 9. Persist the assistant's message. The session-metadata refresh
        // is intentionally skipped on this side: the update path has a
        // known latency hazard under load.
        if anonymous {
            debug!(session_id = %ids.session_id, "anonymous user, skipping response persistence");
        } else if let Some(store) = &self.store {
            let role = format!("{}_aiResponse", ids.user_id);
            if let Err(err) = store
                .save_message(&ids.session_id, &ids.user_id, &role, &reply.content, "text", None)
                .await
            {
                warn!(session_id = %ids.session_id, error = %err, "failed to persist assistant message");
            }
        }

        drop(session);

        // 10. Flush the turn's log entries to the session artifact.
        let log_file = match self.logger.flush(&ids.session_id) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(session_id = %ids.session_id, error = %err, "failed to flush turn log");
                None
            }
        };

        Ok(TurnResult {
            response: reply.content,
            session_id: ids.session_id.clone(),
            has_tool_calls,
            tool_results,
            error: None,
            log_file,
        })
    }

    async fn persist_user_message(&self, request: &TurnRequest, ids: &TurnIds) {
        let Some(store) = &self.store else { return };

        let metadata = request
            .file
            .as_ref()
            .map(|f| serde_json::json!({ "file_kind": f.kind }));
        if let Err(err) = store
            .save_message(
                &ids.session_id,
                &ids.user_id,
                &ids.user_id,
                &request.input,
                "text",
                metadata,
            )
            .await
        {
            warn!(session_id = %ids.session_id, error = %err, "failed to persist user message");
        }

        let title = make_title(&request.input);
        if let Err(err) = store
            .update_session(
                &ids.session_id,
                &ids.user_id,
                Some(&title),
                Some(&request.input),
                Some(&Utc::now().to_rfc3339()),
            )
            .await
        {
            warn!(session_id = %ids.session_id, error = %err, "failed to refresh session metadata");
        }
    }

    async fn enhance_with_memory(
        &self,
        request: &TurnRequest,
        ids: &TurnIds,
        session: &mut SessionState,
    ) {
        let Some(memory) = &self.memory else { return };

        let enhancement = crate::util::with_timeout(
            self.config.memory_timeout,
            memory.enhance(&ids.user_id, &request.input, &ids.session_id),
        )
        .await;

        match enhancement {
            Ok(enhancement) if !enhancement.context_enhancement.is_empty() => {
                debug!(
                    session_id = %ids.session_id,
                    chars = enhancement.context_enhancement.len(),
                    "memory enhancement applied"
                );
                session.append_to_system_message(&enhancement.context_enhancement);
            }
            Ok(_) => {}
            Err(err) => {
                warn!(session_id = %ids.session_id, error = %err, "memory enhancement skipped");
            }
        }
    }

    /// Best-effort search escalation: derive a bounded query, search,
    /// inject findings as system messages, and re-invoke the model
    /// without tool definitions. Any failure keeps the original reply.
    async fn escalate_with_search(
        &self,
        ids: &TurnIds,
        session: &mut SessionState,
        input: &str,
    ) -> Option<ModelReply> {
        let Some(search) = &self.search else {
            debug!(session_id = %ids.session_id, "uncertain response but no search provider configured");
            return None;
        };

        let query = truncate_utf8(input, self.config.query_truncation_limit);
        info!(session_id = %ids.session_id, query, "uncertain response, escalating to search");

        let outcome = match search
            .search(
                query,
                self.config.search_depth,
                self.config.search_max_results,
                true,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(session_id = %ids.session_id, error = %err, "search escalation failed");
                return None;
            }
        };

        let Some(answer) = outcome.answer else {
            debug!(session_id = %ids.session_id, "search returned no synthesized answer");
            return None;
        };

        session.append_system_message(&format!(
            "The previous answer was uncertain. A web search for \"{query}\" found:\n\n\
             {answer}\n\nAnswer the user's question again using this information."
        ));
        if !outcome.results.is_empty() {
            let mut sources = String::from("Sources:\n");
            for hit in outcome.results.iter().take(3) {
                sources.push_str(&format!("- {}: {}\n", hit.title, hit.url));
            }
            sources.push_str("\nInclude these sources in the answer.");
            session.append_system_message(&sources);
        }

        match self.model.invoke(&session.materialize(), None).await {
            Ok(reply) => {
                self.logger.log_model_call(
                    ids,
                    CallKind::SearchEnhanced,
                    session.history().len(),
                    &reply.content,
                    reply.tool_calls.len(),
                );
                Some(reply)
            }
            Err(err) => {
                warn!(session_id = %ids.session_id, error = %err, "search-enhanced model call failed");
                None
            }
        }
    }

    /// Invoke one tool call through the registry. Unknown tools and
    /// execution faults become structured error results appended to
    /// context; the turn never aborts here.
    async fn dispatch_tool(&self, ids: &TurnIds, call: &ToolCall) -> ToolResultPayload {
        let ctx = ToolExecutionContext {
            tool_call_id: Some(call.id.clone()),
        };
        let result = match self.registry.invoke(&call.name, call.arguments.clone(), ctx).await {
            Ok(value) => ToolResultPayload {
                tool_call_id: call.id.clone(),
                result: value,
                is_error: false,
            },
            Err(err) => {
                warn!(tool = %call.name, error = %err, "tool invocation failed");
                ToolResultPayload {
                    tool_call_id: call.id.clone(),
                    result: serde_json::json!({ "error": err.to_string() }),
                    is_error: true,
                }
            }
        };
        self.logger
            .log_tool_call(ids, &call.name, &call.arguments, &result.result, result.is_error);
        result
    }
}

/// Synthesize correlation identifiers for tool calls the model left
/// unkeyed, from a per-turn monotonic counter. Synthesized ids never
/// collide with model-supplied ones.
fn resolve_correlation_ids(mut calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let taken: std::collections::HashSet<String> = calls
        .iter()
        .filter(|c| !c.id.is_empty())
        .map(|c| c.id.clone())
        .collect();
    let mut next = 1usize;
    for call in calls.iter_mut() {
        if call.id.is_empty() {
            let mut id = format!("call_{next}");
            while taken.contains(&id) {
                next += 1;
                id = format!("call_{next}");
            }
            call.id = id;
            next += 1;
        }
    }
    calls
}

fn make_title(input: &str) -> String {
    let title: String = input.chars().take(TITLE_CHARS).collect();
    if input.chars().count() > TITLE_CHARS {
        format!("{title}...")
    } else {
        title
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_synthesized_only_when_absent() {
        let calls = vec![
            ToolCall {
                id: String::new(),
                name: "a".into(),
                arguments: serde_json::Value::Null,
            },
            ToolCall {
                id: "call_x".into(),
                name: "b".into(),
                arguments: serde_json::Value::Null,
            },
            ToolCall {
                id: String::new(),
                name: "c".into(),
                arguments: serde_json::Value::Null,
            },
        ];
        let resolved = resolve_correlation_ids(calls);
        assert_eq!(resolved[0].id, "call_1");
        assert_eq!(resolved[1].id, "call_x");
        assert_eq!(resolved[2].id, "call_2");
    }

    #[test]
    fn synthesized_ids_avoid_model_supplied_ones() {
        let calls = vec![
            ToolCall {
                id: "call_1".into(),
                name: "a".into(),
                arguments: serde_json::Value::Null,
            },
            ToolCall {
                id: String::new(),
                name: "b".into(),
                arguments: serde_json::Value::Null,
            },
        ];
        let resolved = resolve_correlation_ids(calls);
        assert_eq!(resolved[1].id, "call_2");
    }

    #[test]
    fn titles_are_truncated_with_ellipsis() {
        assert_eq!(make_title("short"), "short");
        let long = "x".repeat(40);
        let title = make_title(&long);
        assert_eq!(title.len(), 33);
        assert!(title.ends_with("..."));
    }
}
