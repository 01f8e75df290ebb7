//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! Three operations are exposed: a tool-aware chat round-trip, a streamed
//! text completion and batch embeddings.

pub mod providers;

use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
    /// The provider refused to return content (safety filter).
    #[error("response blocked by provider: {0}")]
    Blocked(String),
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON argument string exactly as the model produced it.
    pub arguments: String,
}

/// One message of a chat prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Set on assistant messages that requested tools.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Set on tool messages: the call this message answers.
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self { tool_calls: calls, ..Self::plain(Role::Assistant, content) }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { tool_call_id: Some(call_id.into()), ..Self::plain(Role::Tool, content) }
    }
}

/// Function-calling definition advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the single-object argument.
    pub parameters: serde_json::Value,
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// Assistant turn of a chat-style response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantMessage {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), tool_calls: Vec::new() }
    }
}

/// Shape of one model response.
///
/// Providers report what they actually received; the agent decoder decides
/// which shapes it accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Chat-style response, possibly carrying tool calls.
    Chat(AssistantMessage),
    /// Plain text-completion response.
    Completion(String),
}

/// Incremental text fragments of a streamed completion.
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new match arms.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
    /// Canned replies for tests; only with `cfg(test)` or the `testing` feature.
    #[cfg(any(test, feature = "testing"))]
    Scripted(providers::scripted::ScriptedProvider),
}

impl LlmProvider {
    /// One chat round-trip with the given tool definitions bound.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelOutput, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.chat(messages, tools).await,
            LlmProvider::OpenAiCompatible(p) => p.chat(messages, tools).await,
            #[cfg(any(test, feature = "testing"))]
            LlmProvider::Scripted(p) => p.chat(messages, tools).await,
        }
    }

    /// Stream the model's reply to a single user prompt.
    pub async fn complete_stream(&self, prompt: &str) -> Result<TextStream, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete_stream(prompt).await,
            LlmProvider::OpenAiCompatible(p) => p.complete_stream(prompt).await,
            #[cfg(any(test, feature = "testing"))]
            LlmProvider::Scripted(p) => p.complete_stream(prompt).await,
        }
    }

    /// Embed each input; the result has one vector per input, in order.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.embed(inputs).await,
            LlmProvider::OpenAiCompatible(p) => p.embed(inputs).await,
            #[cfg(any(test, feature = "testing"))]
            LlmProvider::Scripted(p) => p.embed(inputs).await,
        }
    }
}
