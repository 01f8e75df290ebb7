//! Persisted conversation shapes.
//!
//! The canonical encoding is
//! `{conversation: [{question, answer, tools: [..]}], last_message_utc}`
//! with `tools` always a native JSON array of kind-tagged records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All turns of one session plus the time of the last write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub conversation: Vec<Turn>,
    pub last_message_utc: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(conversation: Vec<Turn>) -> Self {
        Self { conversation, last_message_utc: Utc::now() }
    }
}

/// One user message, the final answer and the tool trace that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub tools: Vec<ToolRecord>,
}

/// A single step of the agent's reasoning trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolRecord {
    /// The model asked for a tool.
    ModelStep {
        call_id: String,
        tool: String,
        /// Raw JSON argument string as the model produced it.
        arguments: String,
        /// Text the model emitted alongside the call.
        #[serde(default)]
        content: String,
    },
    /// What the tool returned.
    ToolResult {
        call_id: String,
        tool: String,
        content: String,
    },
}

impl ToolRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolRecord::ModelStep { .. } => "model_step",
            ToolRecord::ToolResult { .. } => "tool_result",
        }
    }
}
