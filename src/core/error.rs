//! Application-wide error types.
//!
//! Request-path failures inside the agents are typed separately
//! (`AgentError`, `ProxyError`, `ProviderError`); `AppError` covers startup,
//! storage and the RAG pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad TOML, env override or cross-field constraint.
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    /// Session store read/write or (de)serialisation.
    #[error("memory error: {0}")]
    Memory(String),

    /// Listener bind, server loop, crawler transport.
    #[error("comms error: {0}")]
    Comms(String),

    /// Provider construction, embeddings, streamed completions.
    #[error("llm error: {0}")]
    Llm(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_names_the_field() {
        let e = AppError::Config("store.session_entity 'a b' must match [A-Za-z0-9_]+".into());
        assert!(e.to_string().starts_with("config error: store.session_entity"));
    }

    #[test]
    fn llm_error_display() {
        let e = AppError::Llm("embedding count mismatch: sent 2, got 1".into());
        assert_eq!(e.to_string(), "llm error: embedding count mismatch: sent 2, got 1");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port 8080 taken");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("port 8080 taken"));
        let _: &dyn Error = &e;
    }
}
