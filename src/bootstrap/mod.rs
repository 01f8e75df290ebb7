//! Bootstrap layer — modules that run before a service accepts requests.
//!
//! - **logger** — tracing-subscriber initialisation.
//! - **services** — assembles and runs the selected service.

pub mod logger;
pub mod services;
