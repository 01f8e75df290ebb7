//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `BERRY_*` env overrides on top of the merged file.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

const DEFAULT_COORDINATOR_URL: &str = "http://localhost:8080/";
const DEFAULT_KNOWLEDGE_BASE_URL: &str = "http://localhost:8081/";

/// Values taken from the environment that win over the TOML file.
///
/// Tests build this directly instead of mutating process env vars.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub local: Option<bool>,
    pub project_id: Option<String>,
    pub session_entity: Option<String>,
    pub coordinator_url: Option<String>,
    pub knowledge_base_url: Option<String>,
    pub http_port: Option<String>,
    pub llm_api_key: Option<String>,
}

impl EnvOverrides {
    /// Read every supported variable from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build overrides from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            work_dir: var("BERRY_WORK_DIR"),
            log_level: var("BERRY_LOG_LEVEL"),
            // Presence alone enables local mode, whatever the value.
            local: var("BERRY_LOCAL").map(|_| true),
            project_id: var("BERRY_PROJECT_ID"),
            session_entity: var("BERRY_SESSION_ENTITY"),
            coordinator_url: var("BERRY_COORDINATOR_URL"),
            knowledge_base_url: var("BERRY_KNOWLEDGE_BASE_URL"),
            http_port: var("BERRY_HTTP_PORT"),
            llm_api_key: var("LLM_API_KEY"),
        }
    }
}

/// Deep-merge two TOML values.
/// Tables are merged recursively — the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, the built-in
/// defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = EnvOverrides::from_env();

    if let Some(path) = config_path {
        return load_from(Path::new(path), &overrides);
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, &overrides)
    } else {
        resolve(RawConfig::default(), &overrides)
    }
}

/// Internal loader — accepts an explicit path and overrides.
/// Follows `[meta] base = "..."` inheritance chains before resolving.
pub fn load_from(path: &Path, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    resolve(parsed, overrides)
}

fn resolve(parsed: RawConfig, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let s = parsed.service;

    let work_dir = expand_home(overrides.work_dir.as_deref().unwrap_or(&s.work_dir));
    let log_level = overrides.log_level.clone().unwrap_or(s.log_level);
    let log_file = s.log_file.map(|p| {
        let p = expand_home(&p);
        if p.is_absolute() { p } else { work_dir.join(p) }
    });
    let local = overrides.local.unwrap_or(s.local);

    let port_override = overrides
        .http_port
        .as_deref()
        .map(|p| {
            p.trim()
                .parse::<u16>()
                .map_err(|e| AppError::Config(format!("invalid BERRY_HTTP_PORT '{p}': {e}")))
        })
        .transpose()?;

    let project_id = overrides
        .project_id
        .clone()
        .unwrap_or(parsed.store.project_id);
    let session_entity = overrides
        .session_entity
        .clone()
        .unwrap_or(parsed.store.session_entity);
    validate_identifier("store.project_id", &project_id)?;
    validate_identifier("store.session_entity", &session_entity)?;

    let agents = parsed.agents;
    if agents.max_steps == 0 {
        return Err(AppError::Config("agents.max_steps must be > 0".into()));
    }
    if agents.max_attempts == 0 {
        return Err(AppError::Config("agents.max_attempts must be > 0".into()));
    }

    let rag = parsed.rag;
    if rag.chunk_overlap >= rag.chunk_size {
        return Err(AppError::Config(format!(
            "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
            rag.chunk_overlap, rag.chunk_size
        )));
    }
    if rag.ingest_chunk_overlap >= rag.ingest_chunk_size {
        return Err(AppError::Config(format!(
            "rag.ingest_chunk_overlap ({}) must be smaller than rag.ingest_chunk_size ({})",
            rag.ingest_chunk_overlap, rag.ingest_chunk_size
        )));
    }

    let endpoint = |env: &Option<String>, file: Option<String>, default: &str| match env
        .clone()
        .or(file)
    {
        Some(url) => ToolEndpoint { url, explicit: true },
        None => ToolEndpoint { url: default.to_string(), explicit: false },
    };

    Ok(Config {
        work_dir,
        log_level,
        log_file,
        local,
        http: HttpConfig {
            coordinator: parsed.http.coordinator,
            knowledge_base: parsed.http.knowledge_base,
            rag: parsed.http.rag,
            port_override,
        },
        store: StoreConfig { project_id, session_entity },
        agents: AgentsConfig {
            max_steps: agents.max_steps,
            max_attempts: agents.max_attempts,
            max_history_tokens: agents.max_history_tokens,
            prompts_dir: PathBuf::from(agents.prompts_dir),
        },
        tools: ToolsConfig {
            coordinator: endpoint(
                &overrides.coordinator_url,
                parsed.tools.coordinator_url,
                DEFAULT_COORDINATOR_URL,
            ),
            knowledge_base: endpoint(
                &overrides.knowledge_base_url,
                parsed.tools.knowledge_base_url,
                DEFAULT_KNOWLEDGE_BASE_URL,
            ),
            identity_endpoint: parsed.tools.identity_endpoint,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                embeddings_url: parsed.llm.openai.embeddings_url,
                model: parsed.llm.openai.model,
                embedding_model: parsed.llm.openai.embedding_model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
                max_tokens: parsed.llm.openai.max_tokens,
            },
        },
        llm_api_key: overrides.llm_api_key.clone(),
        rag: RagConfig {
            root_url: rag.root_url,
            max_depth: rag.max_depth,
            max_pages: rag.max_pages,
            chunk_size: rag.chunk_size,
            chunk_overlap: rag.chunk_overlap,
            top_k: rag.top_k.max(1),
            ingest_chunk_size: rag.ingest_chunk_size,
            ingest_chunk_overlap: rag.ingest_chunk_overlap,
            crawl_timeout_seconds: rag.crawl_timeout_seconds,
            crawl_on_start: rag.crawl_on_start,
        },
    })
}

/// Store names end up in file and table names, so only `[A-Za-z0-9_]` is allowed.
fn validate_identifier(field: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::Config(format!(
            "{field} must match [A-Za-z0-9_]+, got '{value}'"
        )));
    }
    Ok(())
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
