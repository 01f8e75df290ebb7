//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs that subsystems consume.
//! Raw TOML deserialization types live in `raw.rs`.

use std::path::PathBuf;

// ── HTTP ─────────────────────────────────────────────────────────────────────

/// Listen addresses, one per service.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub coordinator: String,
    pub knowledge_base: String,
    pub rag: String,
    /// Port that replaces the selected service's configured port
    /// (`BERRY_HTTP_PORT`).
    pub port_override: Option<u16>,
}

impl HttpConfig {
    /// Apply [`port_override`](Self::port_override) to `bind`, keeping the host.
    pub fn effective_bind(&self, bind: &str) -> String {
        match self.port_override {
            Some(port) => {
                let host = bind.rsplit_once(':').map(|(h, _)| h).unwrap_or(bind);
                format!("{host}:{port}")
            }
            None => bind.to_string(),
        }
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

/// Session store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Names the database file (`{work_dir}/{project_id}.sqlite3`).
    pub project_id: String,
    /// Table (entity kind) holding one row per session.
    pub session_entity: String,
}

// ── Agents ───────────────────────────────────────────────────────────────────

/// Turn pipeline limits shared by both agents.
#[derive(Debug, Clone)]
pub struct AgentsConfig {
    /// Model calls allowed per attempt before the run is stopped.
    pub max_steps: usize,
    /// Whole-invocation attempts before the fallback sentence is returned.
    pub max_attempts: usize,
    /// Estimated token budget for replayed history.
    pub max_history_tokens: usize,
    pub prompts_dir: PathBuf,
}

// ── Tools ────────────────────────────────────────────────────────────────────

/// Address of a sibling service reached by a tool proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolEndpoint {
    pub url: String,
    /// `true` when the URL came from config or env rather than the
    /// localhost default. Only explicit endpoints get minted identity tokens.
    pub explicit: bool,
}

#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Target of `rewrite_answer_tool`.
    pub coordinator: ToolEndpoint,
    /// Target of `knowledge_base_tool`.
    pub knowledge_base: ToolEndpoint,
    /// Platform metadata endpoint that mints identity tokens.
    pub identity_endpoint: String,
}

// ── LLM ──────────────────────────────────────────────────────────────────────

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Full embeddings endpoint URL.
    pub embeddings_url: String,
    /// Model name passed in the request body.
    pub model: String,
    pub embedding_model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    pub max_tokens: Option<u32>,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Active provider name (`"dummy"`, `"openai"`, `"openai-compatible"`).
    pub provider: String,
    pub openai: OpenAiConfig,
}

// ── RAG ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Crawl root. Only links under this prefix are followed.
    pub root_url: String,
    /// Pages at depth `< max_depth` are fetched; the root is depth 0.
    pub max_depth: usize,
    pub max_pages: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub ingest_chunk_size: usize,
    pub ingest_chunk_overlap: usize,
    pub crawl_timeout_seconds: u64,
    pub crawl_on_start: bool,
}

// ── Top-level ────────────────────────────────────────────────────────────────

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Local mode: in-process session store, no identity-token minting.
    pub local: bool,
    pub http: HttpConfig,
    pub store: StoreConfig,
    pub agents: AgentsConfig,
    pub tools: ToolsConfig,
    pub llm: LlmConfig,
    /// From `LLM_API_KEY` env — never TOML.
    pub llm_api_key: Option<String>,
    pub rag: RagConfig,
}

impl Config {
    /// Path of the SQLite session database.
    pub fn session_db_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.sqlite3", self.store.project_id))
    }
}
