//! Subsystem modules for the agent services.

pub mod agents;
pub mod comms;
pub mod memory;
#[cfg(feature = "service-rag")]
pub mod rag;
pub mod tools;
