//! Comms subsystem — the HTTP ingress of each service.
//!
//! Every service exposes exactly one [`axum_channel::AxumChannel`]; the
//! router it serves is picked by the bootstrap from the service kind.

pub mod axum_channel;

pub use axum_channel::{AxumChannel, agent_router};
#[cfg(feature = "service-rag")]
pub use axum_channel::rag_router;
