//! Service assembly — turns a resolved [`Config`] into one running service.
//!
//! Each process runs exactly one service:
//!
//! | Service | Router | Needs |
//! |---------|--------|-------|
//! | `coordinator` | `/invoke`, `/health` | session store, `knowledge_base_tool` |
//! | `knowledge-base` | `/invoke`, `/health` | `rewrite_answer_tool` |
//! | `rag` | `/`, `/ingest`, `/health` | crawler, vector index |

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::llm::{LlmProvider, providers};
use crate::subsystems::agents::{AgentProfile, AgentRuntime};
use crate::subsystems::comms::{AxumChannel, agent_router};
use crate::subsystems::memory::{SessionHistory, open_store};
use crate::subsystems::tools::ToolBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Coordinator,
    KnowledgeBase,
    Rag,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] =
        [ServiceKind::Coordinator, ServiceKind::KnowledgeBase, ServiceKind::Rag];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "coordinator" => Some(ServiceKind::Coordinator),
            "knowledge-base" | "knowledge_base" => Some(ServiceKind::KnowledgeBase),
            "rag" => Some(ServiceKind::Rag),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Coordinator => "coordinator",
            ServiceKind::KnowledgeBase => "knowledge-base",
            ServiceKind::Rag => "rag",
        }
    }

    /// One-line description for `--help`.
    pub fn summary(self) -> &'static str {
        match self {
            ServiceKind::Coordinator => "Employee-facing agent with session history",
            ServiceKind::KnowledgeBase => "Stateless knowledge-base agent",
            ServiceKind::Rag => "Crawl-and-retrieve question answering",
        }
    }

    fn profile(self) -> Option<AgentProfile> {
        match self {
            ServiceKind::Coordinator => Some(AgentProfile::Coordinator),
            ServiceKind::KnowledgeBase => Some(AgentProfile::KnowledgeBase),
            ServiceKind::Rag => None,
        }
    }

    /// Listen address after `BERRY_HTTP_PORT` is applied.
    pub fn bind_addr(self, config: &Config) -> String {
        let configured = match self {
            ServiceKind::Coordinator => &config.http.coordinator,
            ServiceKind::KnowledgeBase => &config.http.knowledge_base,
            ServiceKind::Rag => &config.http.rag,
        };
        config.http.effective_bind(configured)
    }
}

pub fn build_provider(config: &Config) -> Result<LlmProvider, AppError> {
    providers::build(&config.llm, config.llm_api_key.clone()).map_err(|e| AppError::Llm(e.to_string()))
}

/// Assemble the runtime for an agent profile: store, tools, persona.
pub fn build_agent(
    profile: AgentProfile,
    config: &Config,
    provider: LlmProvider,
) -> Result<AgentRuntime, AppError> {
    let history = SessionHistory::new(open_store(config)?);
    let tools = ToolBox::from_config(config, profile.tools());
    Ok(AgentRuntime::new(profile, config, provider, tools, history))
}

/// Build and serve `kind` until `shutdown` is cancelled.
pub async fn run(kind: ServiceKind, config: &Config, shutdown: CancellationToken) -> Result<(), AppError> {
    let provider = build_provider(config)?;
    let bind_addr = kind.bind_addr(config);

    let router = match kind.profile() {
        Some(profile) => {
            let runtime = build_agent(profile, config, provider)?;
            info!(
                service = kind.name(),
                history = runtime.history_backend(),
                steps = config.agents.max_steps,
                attempts = config.agents.max_attempts,
                "agent ready"
            );
            agent_router(kind.name(), Arc::new(runtime))
        }
        None => rag_router(config, provider).await?,
    };

    AxumChannel::new(kind.name(), bind_addr, router).run(shutdown).await
}

#[cfg(feature = "service-rag")]
async fn rag_router(config: &Config, provider: LlmProvider) -> Result<axum::Router, AppError> {
    use crate::subsystems::rag::RagService;

    let service = RagService::new(provider, config);
    if config.rag.crawl_on_start {
        service.build_index().await?;
    } else {
        info!("rag crawl disabled, starting with an empty index");
    }
    Ok(crate::subsystems::comms::rag_router("rag", Arc::new(service)))
}

#[cfg(not(feature = "service-rag"))]
async fn rag_router(_config: &Config, _provider: LlmProvider) -> Result<axum::Router, AppError> {
    Err(AppError::Config("rag service not compiled in (enable feature `service-rag`)".into()))
}
