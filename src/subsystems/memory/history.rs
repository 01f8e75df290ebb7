//! [`SessionHistory`] — async access to session turns.
//!
//! All store I/O runs on `tokio::task::spawn_blocking`. The reserved
//! [`STATELESS_SESSION_ID`] bypasses the store entirely.

use std::sync::Arc;

use tracing::debug;

use crate::error::AppError;
use crate::llm::{ChatMessage, ToolCallRequest};

use super::store::SessionStore;
use super::types::{SessionRecord, ToolRecord, Turn};

/// Session id used for agent-to-agent calls that must not touch history.
pub const STATELESS_SESSION_ID: &str = "knowledge-base";

pub fn is_stateless(session_id: &str) -> bool {
    session_id == STATELESS_SESSION_ID
}

/// Cheaply cloneable handle over the configured store.
#[derive(Clone)]
pub struct SessionHistory {
    store: Arc<dyn SessionStore>,
}

impl SessionHistory {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &str {
        self.store.backend()
    }

    /// Ordered turns of `session_id`; empty for unknown or stateless ids.
    pub async fn load(&self, session_id: &str) -> Result<Vec<Turn>, AppError> {
        if is_stateless(session_id) {
            debug!(session_id, "stateless session — history load skipped");
            return Ok(Vec::new());
        }
        let store = self.store.clone();
        let id = session_id.to_string();
        let record = tokio::task::spawn_blocking(move || store.get(&id))
            .await
            .map_err(|e| AppError::Memory(format!("history load join: {e}")))??;
        Ok(record.map(|r| r.conversation).unwrap_or_default())
    }

    /// Overwrite the session with `turns` and a fresh timestamp.
    /// No-op for the stateless id.
    pub async fn save(&self, session_id: &str, turns: Vec<Turn>) -> Result<(), AppError> {
        if is_stateless(session_id) {
            debug!(session_id, "stateless session — history save skipped");
            return Ok(());
        }
        let store = self.store.clone();
        let id = session_id.to_string();
        let record = SessionRecord::new(turns);
        tokio::task::spawn_blocking(move || store.put(&id, &record))
            .await
            .map_err(|e| AppError::Memory(format!("history save join: {e}")))?
    }
}

/// Rebuild prompt messages from stored turns.
///
/// Each turn becomes the user question, the recorded tool exchange, then the
/// assistant answer. Consecutive model steps are merged into one assistant
/// message so every tool-call message is followed by its results.
pub fn replay(turns: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::new();
    for turn in turns {
        messages.push(ChatMessage::user(&turn.question));

        let mut pending_calls: Vec<ToolCallRequest> = Vec::new();
        let mut pending_content = String::new();
        for record in &turn.tools {
            match record {
                ToolRecord::ModelStep { call_id, tool, arguments, content } => {
                    if pending_content.is_empty() {
                        pending_content = content.clone();
                    }
                    pending_calls.push(ToolCallRequest {
                        id: call_id.clone(),
                        name: tool.clone(),
                        arguments: arguments.clone(),
                    });
                }
                ToolRecord::ToolResult { call_id, content, .. } => {
                    if !pending_calls.is_empty() {
                        messages.push(ChatMessage::assistant_tool_calls(
                            std::mem::take(&mut pending_content),
                            std::mem::take(&mut pending_calls),
                        ));
                    }
                    messages.push(ChatMessage::tool(call_id, content));
                }
            }
        }
        // A model step without a recorded result cannot be replayed as a call.
        if !pending_calls.is_empty() {
            debug!(calls = pending_calls.len(), "dropping unanswered tool calls from replay");
        }

        messages.push(ChatMessage::assistant(&turn.answer));
    }
    messages
}
