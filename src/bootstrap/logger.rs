//! Logging initialisation via tracing-subscriber.
//!
//! Level precedence: CLI `-v` flags, then `RUST_LOG`, then the config file.
//! HTTP and TLS internals are capped at `warn` unless the caller asks for
//! `trace`, so `-vvv` shows tool calls and retrieval hits without hyper's
//! connection chatter.
//!
//! Call [`init`] once at startup, after the config is loaded.

use std::path::Path;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::AppError;

/// Crates whose debug output drowns the services' own logs.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "rustls", "html5ever"];

/// Initialise the global tracing subscriber.
///
/// `cli_level` comes from `-v` flags and always wins. Without it `RUST_LOG`
/// is used when set and valid, and `config_level` otherwise. Both accept
/// bare levels or full `EnvFilter` directives. Output goes to stderr, or is
/// appended to `log_file` without ANSI colours.
pub fn init(config_level: &str, cli_level: Option<&str>, log_file: Option<&Path>) -> Result<(), AppError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(cli_level, rust_log.as_deref(), config_level)?;

    let writer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AppError::Logger(format!("failed to open log file '{}': {e}", path.display()))
                })?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

/// Resolve the effective filter from the three level sources.
fn build_filter(cli: Option<&str>, rust_log: Option<&str>, config: &str) -> Result<EnvFilter, AppError> {
    let (source, directives) = match (cli, rust_log) {
        (Some(level), _) => ("cli", level),
        (None, Some(env)) if EnvFilter::try_new(env).is_ok() => ("RUST_LOG", env),
        _ => ("config", config),
    };
    let mut filter = EnvFilter::try_new(directives)
        .map_err(|e| AppError::Logger(format!("invalid log level '{directives}' from {source}: {e}")))?;

    if !directives.contains("trace") {
        for target in NOISY_TARGETS {
            filter = filter.add_directive(quiet(target)?);
        }
    }
    Ok(filter)
}

fn quiet(target: &str) -> Result<Directive, AppError> {
    format!("{target}=warn")
        .parse()
        .map_err(|e| AppError::Logger(format!("bad directive for {target}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_beats_env_and_config() {
        let f = build_filter(Some("debug"), Some("error"), "info").unwrap();
        assert!(f.to_string().contains("debug"));
        assert!(!f.to_string().contains("error"));
    }

    #[test]
    fn env_beats_config_when_valid() {
        let f = build_filter(None, Some("berry_agents=trace"), "info").unwrap();
        assert!(f.to_string().contains("berry_agents=trace"));

        let f = build_filter(None, Some("berry_agents=loud"), "warn").unwrap();
        assert!(!f.to_string().contains("loud"));
    }

    #[test]
    fn dependency_noise_is_capped_below_trace() {
        let f = build_filter(None, None, "debug").unwrap().to_string();
        assert!(f.contains("hyper=warn"));
        assert!(f.contains("reqwest=warn"));

        let f = build_filter(Some("trace"), None, "info").unwrap().to_string();
        assert!(!f.contains("hyper=warn"));
    }

    #[test]
    fn invalid_config_level_is_an_error() {
        let err = build_filter(None, None, "berry_agents=loud").unwrap_err();
        assert!(err.to_string().contains("from config"));
    }

    #[test]
    fn init_to_file_succeeds_or_already_init() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("berry.log");
        // Another test may have installed the global subscriber first.
        match init("info", Some("info"), Some(&path)) {
            Ok(()) => assert!(path.exists()),
            Err(AppError::Logger(msg)) => assert!(msg.contains("failed to set subscriber")),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
