//! Tools subsystem — typed single-argument tools backed by sibling services.
//!
//! | Tool | Input | Target |
//! |------|-------|--------|
//! | `knowledge_base_tool` | `{query}` | knowledge-base service, no session |
//! | `rewrite_answer_tool` | `{answer}` | coordinator, stateless session |
//!
//! Proxies never retry. A failed call fails the whole request.

pub mod identity;
pub mod remote;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, ToolEndpoint};
use crate::llm::ToolDefinition;
use crate::subsystems::memory::STATELESS_SESSION_ID;

use identity::TokenSource;
use remote::RemoteChain;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("tool transport failed: {0}")]
    Transport(String),
    #[error("tool endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("tool reply could not be decoded: {0}")]
    Decode(String),
    #[error("identity token unavailable: {0}")]
    Identity(String),
    #[error("tool '{0}' is not bound for this agent")]
    Unbound(&'static str),
}

// ── Tool kinds ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    KnowledgeBase,
    RewriteAnswer,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::KnowledgeBase, ToolKind::RewriteAnswer];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::KnowledgeBase => "knowledge_base_tool",
            ToolKind::RewriteAnswer => "rewrite_answer_tool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::KnowledgeBase => {
                "A tool to get access to the knowledge base. Input is the question that must \
                 be provided by the user. Output is the information found in the knowledge base."
            }
            ToolKind::RewriteAnswer => {
                "A tool to rewrite your answers before sending them to the user. \
                 Input is your answer. Output is the rewritten answer."
            }
        }
    }

    fn argument(self) -> (&'static str, &'static str) {
        match self {
            ToolKind::KnowledgeBase => ("query", "the question to ask the knowledge base"),
            ToolKind::RewriteAnswer => ("answer", "the answer to rewrite"),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        let (arg, arg_description) = self.argument();
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    arg: { "type": "string", "description": arg_description }
                },
                "required": [arg],
            }),
        }
    }

    /// Decode a raw JSON argument string into this tool's typed input.
    pub fn parse_input(self, raw: &str) -> Result<ToolInput, serde_json::Error> {
        match self {
            ToolKind::KnowledgeBase => {
                serde_json::from_str::<KnowledgeBaseInput>(raw).map(ToolInput::KnowledgeBase)
            }
            ToolKind::RewriteAnswer => {
                serde_json::from_str::<RewriteAnswerInput>(raw).map(ToolInput::RewriteAnswer)
            }
        }
    }
}

// ── Inputs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KnowledgeBaseInput {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RewriteAnswerInput {
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    KnowledgeBase(KnowledgeBaseInput),
    RewriteAnswer(RewriteAnswerInput),
}

impl ToolInput {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolInput::KnowledgeBase(_) => ToolKind::KnowledgeBase,
            ToolInput::RewriteAnswer(_) => ToolKind::RewriteAnswer,
        }
    }
}

/// Message sent to the coordinator by `rewrite_answer_tool`.
pub fn rewrite_request(answer: &str) -> String {
    format!("Please rewrite the following answer to match your personality: {answer}")
}

// ── ToolBox ───────────────────────────────────────────────────────────────────

/// The tools bound to one agent, each with its remote chain.
#[derive(Debug, Clone, Default)]
pub struct ToolBox {
    bound: Vec<(ToolKind, RemoteChain)>,
}

impl ToolBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: ToolKind, chain: RemoteChain) -> Self {
        self.bound.retain(|(k, _)| *k != kind);
        self.bound.push((kind, chain));
        self
    }

    /// Build a toolbox for `kinds` from the resolved tool config.
    pub fn from_config(config: &Config, kinds: &[ToolKind]) -> Self {
        let client = Client::new();
        kinds.iter().fold(Self::new(), |tb, kind| {
            let endpoint: &ToolEndpoint = match kind {
                ToolKind::KnowledgeBase => &config.tools.knowledge_base,
                ToolKind::RewriteAnswer => &config.tools.coordinator,
            };
            let tokens = TokenSource::select(
                endpoint.explicit,
                config.local,
                client.clone(),
                &config.tools.identity_endpoint,
            );
            info!(
                tool = kind.name(),
                url = %endpoint.url,
                minted = matches!(tokens, TokenSource::Metadata { .. }),
                "tool bound"
            );
            tb.with(*kind, RemoteChain::new(client.clone(), endpoint.url.clone(), tokens))
        })
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        self.bound.iter().map(|(k, _)| *k).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.bound.iter().map(|(k, _)| k.definition()).collect()
    }

    /// Bound tool with this name, if any.
    pub fn lookup(&self, name: &str) -> Option<ToolKind> {
        ToolKind::from_name(name).filter(|k| self.bound.iter().any(|(b, _)| b == k))
    }

    /// Run one tool call against its sibling service.
    pub async fn invoke(&self, input: &ToolInput, caller_auth: Option<&str>) -> Result<String, ProxyError> {
        let kind = input.kind();
        let chain = self
            .bound
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, c)| c)
            .ok_or(ProxyError::Unbound(kind.name()))?;
        match input {
            ToolInput::KnowledgeBase(i) => chain.invoke(&i.query, None, caller_auth).await,
            ToolInput::RewriteAnswer(i) => {
                chain
                    .invoke(&rewrite_request(&i.answer), Some(STATELESS_SESSION_ID), caller_auth)
                    .await
            }
        }
    }
}
