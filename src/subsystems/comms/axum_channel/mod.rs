//! Axum-based HTTP channel — one router per service.
//!
//! `run()` drives the axum event loop; the shared [`CancellationToken`] is
//! wired to axum's graceful shutdown.
//!
//! ## URL layout
//!
//! ```text
//! coordinator / knowledge base
//!   POST /invoke   {message, session_id?} → {output}
//!   GET  /health
//!
//! rag
//!   POST /         {question} → text/plain stream
//!   POST /ingest   {text}     → {ok: true}
//!   GET  /health
//! ```

mod api;
#[cfg(feature = "service-rag")]
mod rag;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;
use crate::subsystems::agents::AgentRuntime;
#[cfg(feature = "service-rag")]
use crate::subsystems::rag::RagService;

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state for the agent services.
///
/// Cheap to clone — all fields are reference-counted.
#[derive(Clone)]
pub(crate) struct AgentState {
    /// Channel identifier used in log fields.
    pub channel_id: Arc<str>,
    pub runtime: Arc<AgentRuntime>,
}

#[cfg(feature = "service-rag")]
#[derive(Clone)]
pub(crate) struct RagState {
    pub channel_id: Arc<str>,
    pub service: Arc<RagService>,
}

// ── AxumChannel ───────────────────────────────────────────────────────────────

pub struct AxumChannel {
    channel_id: String,
    bind_addr: String,
    router: Router,
}

impl AxumChannel {
    pub fn new(channel_id: impl Into<String>, bind_addr: impl Into<String>, router: Router) -> Self {
        Self {
            channel_id: channel_id.into(),
            bind_addr: bind_addr.into(),
            router,
        }
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        let AxumChannel { channel_id, bind_addr, router } = self;

        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| AppError::Comms(format!("axum bind failed on {bind_addr}: {e}")))?;

        let local = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| bind_addr.clone());
        info!(%channel_id, bind_addr = %local, "axum channel listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| AppError::Comms(format!("axum server error: {e}")))?;

        info!(%channel_id, "axum channel shut down");
        Ok(())
    }
}

// ── Routers ───────────────────────────────────────────────────────────────────

/// Router for the coordinator and knowledge-base services.
pub fn agent_router(channel_id: &str, runtime: Arc<AgentRuntime>) -> Router {
    let state = AgentState { channel_id: Arc::from(channel_id), runtime };
    Router::new()
        .route("/invoke", post(api::invoke))
        .route("/health", get(api::health))
        .with_state(state)
}

#[cfg(feature = "service-rag")]
pub fn rag_router(channel_id: &str, service: Arc<RagService>) -> Router {
    let state = RagState { channel_id: Arc::from(channel_id), service };
    Router::new()
        .route("/", post(rag::answer))
        .route("/ingest", post(rag::ingest))
        .route("/health", get(rag::health))
        .with_state(state)
}
