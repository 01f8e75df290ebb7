//! Agents subsystem — the turn pipeline shared by both conversational agents.
//!
//! One [`AgentRuntime`] serves one [`AgentProfile`]. A turn runs as:
//!
//! 1. load history (stateful profiles with a real session id only)
//! 2. prompt = persona, `Understood!`, condensed history, message, scratchpad
//! 3. model call → [`decoder::decode`] → tool calls or a final answer,
//!    bounded by `max_steps` model calls
//! 4. trim + content filter; rerun the whole turn while the filter rejects,
//!    up to `max_attempts`
//! 5. persist the new turn
//!
//! A provider safety block counts as a rejected attempt. Everything else
//! (transport, tool proxy, unsupported response shape, history load)
//! fails the turn.

pub mod core;
pub mod decoder;
pub mod filter;
pub mod summary;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::llm::{ChatMessage, LlmProvider, ProviderError};
use crate::subsystems::memory::{SessionHistory, ToolRecord, Turn, is_stateless};
use crate::subsystems::tools::{ProxyError, ToolBox, ToolKind};

use self::core::prompt::PromptBuilder;
use decoder::{AgentDecision, DecodeError, DecodedCall, decode};
use filter::{FALLBACK_MESSAGE, ITERATION_LIMIT_MESSAGE, finalize, is_fallback};
use summary::HistoryCondenser;

/// Assistant reply that follows the persona instruction in every prompt.
pub const ACKNOWLEDGEMENT: &str = "Understood!";

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Tool(#[from] ProxyError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Memory(#[from] AppError),
}

impl AgentError {
    /// Short machine-readable code for HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Decode(_) => "decode_error",
            AgentError::Tool(_) => "tool_error",
            AgentError::Provider(_) => "provider_error",
            AgentError::Memory(_) => "storage_error",
        }
    }
}

// ── Profiles ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentProfile {
    Coordinator,
    KnowledgeBase,
}

impl AgentProfile {
    pub fn id(self) -> &'static str {
        match self {
            AgentProfile::Coordinator => "coordinator",
            AgentProfile::KnowledgeBase => "knowledge_base",
        }
    }

    /// Persona file under the prompts directory.
    pub fn persona_file(self) -> &'static str {
        match self {
            AgentProfile::Coordinator => "coordinator.md",
            AgentProfile::KnowledgeBase => "knowledge_base.md",
        }
    }

    fn persona_fallback(self) -> &'static str {
        match self {
            AgentProfile::Coordinator => {
                "Your job is to help employees find answers to questions using your knowledge \
                 base. You should always use the knowledge base tool."
            }
            AgentProfile::KnowledgeBase => {
                "You are a knowledge base. Before giving an answer to the user, you must first \
                 rewrite the answer to match your personality using your tool."
            }
        }
    }

    /// Whether turns are loaded from and saved to the session store.
    pub fn stateful(self) -> bool {
        matches!(self, AgentProfile::Coordinator)
    }

    pub fn tools(self) -> &'static [ToolKind] {
        match self {
            AgentProfile::Coordinator => &[ToolKind::KnowledgeBase],
            AgentProfile::KnowledgeBase => &[ToolKind::RewriteAnswer],
        }
    }
}

// ── Runtime ───────────────────────────────────────────────────────────────────

/// One incoming message.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub message: String,
    pub session_id: Option<String>,
    /// Caller's `Authorization` header, forwarded to tool backends.
    pub authorization: Option<String>,
}

/// Final text of one attempt plus the tool records it produced.
struct AttemptOutcome {
    raw: String,
    records: Vec<ToolRecord>,
}

pub struct AgentRuntime {
    profile: AgentProfile,
    provider: LlmProvider,
    tools: ToolBox,
    history: SessionHistory,
    condenser: HistoryCondenser,
    persona: String,
    max_steps: usize,
    max_attempts: usize,
}

impl AgentRuntime {
    pub fn new(
        profile: AgentProfile,
        config: &Config,
        provider: LlmProvider,
        tools: ToolBox,
        history: SessionHistory,
    ) -> Self {
        let persona = PromptBuilder::new(&config.agents.prompts_dir)
            .layer_or(profile.persona_file(), profile.persona_fallback())
            .build();
        let condenser = HistoryCondenser::new(
            provider.clone(),
            &config.agents.prompts_dir,
            config.agents.max_history_tokens,
        );
        Self {
            profile,
            provider,
            tools,
            history,
            condenser,
            persona,
            max_steps: config.agents.max_steps,
            max_attempts: config.agents.max_attempts,
        }
    }

    pub fn profile(&self) -> AgentProfile {
        self.profile
    }

    pub fn history_backend(&self) -> &str {
        self.history.backend()
    }

    /// Session id to persist under, if this turn persists at all.
    fn persisted_session<'a>(&self, request: &'a TurnRequest) -> Option<&'a str> {
        if !self.profile.stateful() {
            return None;
        }
        request.session_id.as_deref().filter(|id| !is_stateless(id))
    }

    /// Run one turn and return the filtered answer.
    pub async fn invoke(&self, request: &TurnRequest) -> Result<String, AgentError> {
        let session = self.persisted_session(request);
        info!(
            agent = self.profile.id(),
            session_id = request.session_id.as_deref().unwrap_or("-"),
            persisted = session.is_some(),
            "turn started"
        );

        let mut turns = match session {
            Some(id) => self.history.load(id).await?,
            None => Vec::new(),
        };

        let mut prefix = vec![
            ChatMessage::user(&self.persona),
            ChatMessage::assistant(ACKNOWLEDGEMENT),
        ];
        if !turns.is_empty() {
            prefix.extend(self.condenser.condense(&turns).await);
        }
        prefix.push(ChatMessage::user(&request.message));

        let auth = request.authorization.as_deref();
        let mut output = FALLBACK_MESSAGE.to_string();
        let mut records = Vec::new();
        for attempt in 1..=self.max_attempts {
            match self.attempt(&prefix, auth).await {
                Ok(outcome) => {
                    output = finalize(&outcome.raw);
                    records = outcome.records;
                }
                Err(AgentError::Provider(ProviderError::Blocked(reason))) => {
                    warn!(agent = self.profile.id(), attempt, %reason, "model response blocked");
                    output = FALLBACK_MESSAGE.to_string();
                    records = Vec::new();
                }
                Err(e) => return Err(e),
            }
            if !is_fallback(&output) {
                break;
            }
            info!(
                agent = self.profile.id(),
                attempt,
                max = self.max_attempts,
                "output rejected by filter"
            );
        }

        if let Some(id) = session {
            turns.push(Turn {
                question: request.message.clone(),
                answer: output.clone(),
                tools: records,
            });
            if let Err(e) = self.history.save(id, turns).await {
                warn!(session_id = id, error = %e, "history save failed, answer still returned");
            }
        }

        info!(agent = self.profile.id(), fallback = is_fallback(&output), "turn finished");
        Ok(output)
    }

    /// One full reasoning run: model calls and tool calls until a final
    /// answer or the step limit.
    async fn attempt(
        &self,
        prefix: &[ChatMessage],
        auth: Option<&str>,
    ) -> Result<AttemptOutcome, AgentError> {
        let definitions = self.tools.definitions();
        let mut scratchpad: Vec<ChatMessage> = Vec::new();
        let mut records: Vec<ToolRecord> = Vec::new();

        for step in 1..=self.max_steps {
            let mut messages = prefix.to_vec();
            messages.extend(scratchpad.iter().cloned());
            tracing::trace!(step, ?messages, "model request");

            let output = self.provider.chat(&messages, &definitions).await?;
            let (content, calls) = match decode(output, &self.tools)? {
                AgentDecision::Finish(text) => {
                    debug!(step, "final answer");
                    return Ok(AttemptOutcome { raw: text, records });
                }
                AgentDecision::Invoke { content, calls } => (content, calls),
            };

            scratchpad.push(ChatMessage::assistant_tool_calls(
                content.clone(),
                calls.iter().map(DecodedCall::request).collect(),
            ));
            records.extend(calls.iter().map(|call| ToolRecord::ModelStep {
                call_id: call.id.clone(),
                tool: call.tool.clone(),
                arguments: call.raw_arguments.clone(),
                content: content.clone(),
            }));

            for call in calls {
                let observation = match &call.input {
                    Ok(input) => {
                        debug!(step, tool = %call.tool, "invoking tool");
                        self.tools.invoke(input, auth).await?
                    }
                    Err(e) => {
                        warn!(step, tool = %call.tool, error = %e, "unusable tool call");
                        FALLBACK_MESSAGE.to_string()
                    }
                };
                scratchpad.push(ChatMessage::tool(&call.id, &observation));
                records.push(ToolRecord::ToolResult {
                    call_id: call.id,
                    tool: call.tool,
                    content: observation,
                });
            }
        }

        warn!(agent = self.profile.id(), max_steps = self.max_steps, "step limit reached");
        Ok(AttemptOutcome { raw: ITERATION_LIMIT_MESSAGE.to_string(), records })
    }
}
