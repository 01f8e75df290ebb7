//! berry-agents — service entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI (service name, `-f`, `-v…`)
//!   3. Load config
//!   4. Init logger once (CLI `-v` flags > RUST_LOG > config)
//!   5. Spawn Ctrl-C → shutdown signal watcher
//!   6. Build and serve the selected service until shutdown

use tokio_util::sync::CancellationToken;
use tracing::info;

use berry_agents::bootstrap::services::{self, ServiceKind};
use berry_agents::{config, error, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), error::AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = match parse_cli_args(std::env::args().skip(1)) {
        Ok(CliAction::Run(args)) => args,
        Ok(CliAction::Help) => {
            print_usage();
            return Ok(());
        }
        Err(msg) => {
            eprintln!("error: {msg}");
            print_usage();
            std::process::exit(2);
        }
    };

    let config = config::load(args.config_path.as_deref())?;

    logger::init(&config.log_level, args.log_level, config.log_file.as_deref())?;

    info!(
        service = args.service.name(),
        work_dir = %config.work_dir.display(),
        local = config.local,
        llm_provider = %config.llm.provider,
        llm_model = %config.llm.openai.model,
        configured_log_level = %config.log_level,
        cli_log_level = ?args.log_level,
        "config loaded"
    );

    // Shared shutdown token — Ctrl-C cancels it, the server watches it.
    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    services::run(args.service, &config, shutdown).await?;

    info!(service = args.service.name(), "stopped");
    Ok(())
}

#[derive(Debug, PartialEq)]
struct CliArgs {
    service: ServiceKind,
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

#[derive(Debug, PartialEq)]
enum CliAction {
    Run(CliArgs),
    Help,
}

fn print_usage() {
    println!("Usage: berry-agents <SERVICE> [OPTIONS]");
    println!();
    println!("Services:");
    for kind in ServiceKind::ALL {
        println!("  {:<27}{}", kind.name(), kind.summary());
    }
    println!();
    println!("Options:");
    println!("  -h, --help                 Print help");
    println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
    println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
}

/// Each `-v` raises verbosity one tier:
///   -v      → warn
///   -vv     → info
///   -vvv    → debug  (tool calls, retrieval hits)
///   -vvvv+  → trace  (full prompt payloads)
fn verbosity_level(count: usize) -> Option<&'static str> {
    match count {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    }
}

fn parse_cli_args<I>(args: I) -> Result<CliAction, String>
where
    I: IntoIterator<Item = String>,
{
    let mut verbosity = 0usize;
    let mut config_path = None;
    let mut service = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--" => break,
            "-h" | "--help" => return Ok(CliAction::Help),
            "-f" | "--config" => {
                let path = iter.next().ok_or("-f/--config requires a path argument")?;
                config_path = Some(path);
            }
            "--verbose" => verbosity += 1,
            a if a.len() > 1 && a.starts_with('-') && a[1..].chars().all(|c| c == 'v') => {
                verbosity += a.len() - 1;
            }
            a if !a.starts_with('-') && service.is_none() => {
                service = Some(ServiceKind::parse(a).ok_or_else(|| format!("unknown service '{a}'"))?);
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    let service = service.ok_or("a service name is required")?;
    Ok(CliAction::Run(CliArgs {
        service,
        log_level: verbosity_level(verbosity),
        config_path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliAction, String> {
        parse_cli_args(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn service_with_flags() {
        let action = parse(&["rag", "-vvv", "-f", "conf/prod.toml"]).unwrap();
        assert_eq!(
            action,
            CliAction::Run(CliArgs {
                service: ServiceKind::Rag,
                log_level: Some("debug"),
                config_path: Some("conf/prod.toml".into()),
            })
        );
    }

    #[test]
    fn verbosity_accumulates_across_flags() {
        let Ok(CliAction::Run(args)) = parse(&["-v", "coordinator", "--verbose"]) else {
            panic!("expected run");
        };
        assert_eq!(args.log_level, Some("info"));
        let Ok(CliAction::Run(args)) = parse(&["knowledge-base", "-vvvvvv"]) else {
            panic!("expected run");
        };
        assert_eq!(args.log_level, Some("trace"));
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(parse(&["--help", "bogus"]), Ok(CliAction::Help));
    }

    #[test]
    fn usage_errors() {
        assert!(parse(&[]).unwrap_err().contains("service name is required"));
        assert!(parse(&["mailer"]).unwrap_err().contains("unknown service"));
        assert!(parse(&["rag", "-f"]).unwrap_err().contains("requires a path"));
        assert!(parse(&["rag", "coordinator"]).unwrap_err().contains("unexpected argument"));
        assert!(parse(&["rag", "-x"]).unwrap_err().contains("unexpected argument"));
    }
}
