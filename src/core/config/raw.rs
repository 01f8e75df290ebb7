//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape — serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub service: RawService,
    #[serde(default)]
    pub http: RawHttp,
    #[serde(default)]
    pub store: RawStore,
    #[serde(default)]
    pub agents: RawAgents,
    #[serde(default)]
    pub tools: RawTools,
    #[serde(default)]
    pub llm: RawLlm,
    #[serde(default)]
    pub rag: RawRag,
}

#[derive(Deserialize)]
pub(super) struct RawService {
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default)]
    pub local: bool,
}

impl Default for RawService {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            log_level: default_log_level(),
            log_file: None,
            local: false,
        }
    }
}

// ── HTTP ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawHttp {
    #[serde(default = "default_coordinator_bind")]
    pub coordinator: String,
    #[serde(default = "default_knowledge_base_bind")]
    pub knowledge_base: String,
    #[serde(default = "default_rag_bind")]
    pub rag: String,
}

impl Default for RawHttp {
    fn default() -> Self {
        Self {
            coordinator: default_coordinator_bind(),
            knowledge_base: default_knowledge_base_bind(),
            rag: default_rag_bind(),
        }
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawStore {
    #[serde(default = "default_project_id")]
    pub project_id: String,
    #[serde(default = "default_session_entity")]
    pub session_entity: String,
}

impl Default for RawStore {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            session_entity: default_session_entity(),
        }
    }
}

// ── Agents ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawAgents {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_max_history_tokens")]
    pub max_history_tokens: usize,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
}

impl Default for RawAgents {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_attempts: default_max_attempts(),
            max_history_tokens: default_max_history_tokens(),
            prompts_dir: default_prompts_dir(),
        }
    }
}

// ── Tools ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawTools {
    /// Explicit coordinator URL. Unset means the localhost default with
    /// caller-token pass-through.
    #[serde(default)]
    pub coordinator_url: Option<String>,
    #[serde(default)]
    pub knowledge_base_url: Option<String>,
    #[serde(default = "default_identity_endpoint")]
    pub identity_endpoint: String,
}

impl Default for RawTools {
    fn default() -> Self {
        Self {
            coordinator_url: None,
            knowledge_base_url: None,
            identity_endpoint: default_identity_endpoint(),
        }
    }
}

// ── LLM ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            openai: RawOpenAiConfig::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_embeddings_url")]
    pub embeddings_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_openai_temperature")]
    pub temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            embeddings_url: default_openai_embeddings_url(),
            model: default_openai_model(),
            embedding_model: default_openai_embedding_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
            max_tokens: None,
        }
    }
}

// ── RAG ──────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawRag {
    #[serde(default = "default_rag_root_url")]
    pub root_url: String,
    #[serde(default = "default_rag_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_rag_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_rag_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_rag_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_rag_top_k")]
    pub top_k: usize,
    #[serde(default = "default_rag_ingest_chunk_size")]
    pub ingest_chunk_size: usize,
    #[serde(default = "default_rag_ingest_chunk_overlap")]
    pub ingest_chunk_overlap: usize,
    #[serde(default = "default_rag_crawl_timeout_seconds")]
    pub crawl_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub crawl_on_start: bool,
}

impl Default for RawRag {
    fn default() -> Self {
        Self {
            root_url: default_rag_root_url(),
            max_depth: default_rag_max_depth(),
            max_pages: default_rag_max_pages(),
            chunk_size: default_rag_chunk_size(),
            chunk_overlap: default_rag_chunk_overlap(),
            top_k: default_rag_top_k(),
            ingest_chunk_size: default_rag_ingest_chunk_size(),
            ingest_chunk_overlap: default_rag_ingest_chunk_overlap(),
            crawl_timeout_seconds: default_rag_crawl_timeout_seconds(),
            crawl_on_start: true,
        }
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_work_dir() -> String {
    "~/.berry".to_string()
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_coordinator_bind() -> String {
    "0.0.0.0:8080".to_string()
}

pub(super) fn default_knowledge_base_bind() -> String {
    "0.0.0.0:8081".to_string()
}

pub(super) fn default_rag_bind() -> String {
    "0.0.0.0:8082".to_string()
}

pub(super) fn default_project_id() -> String {
    "berry".to_string()
}

pub(super) fn default_session_entity() -> String {
    "session".to_string()
}

pub(super) fn default_max_steps() -> usize {
    15
}

pub(super) fn default_max_attempts() -> usize {
    2
}

pub(super) fn default_max_history_tokens() -> usize {
    8192
}

pub(super) fn default_prompts_dir() -> String {
    "config/prompts".to_string()
}

pub(super) fn default_identity_endpoint() -> String {
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/identity"
        .to_string()
}

pub(super) fn default_llm_provider() -> String {
    "dummy".to_string()
}

pub(super) fn default_openai_api_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

pub(super) fn default_openai_embeddings_url() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

pub(super) fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

pub(super) fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

pub(super) fn default_openai_temperature() -> f32 {
    0.2
}

pub(super) fn default_openai_timeout_seconds() -> u64 {
    60
}

pub(super) fn default_rag_root_url() -> String {
    "https://developers.google.com/machine-learning/guides/".to_string()
}

pub(super) fn default_rag_max_depth() -> usize {
    2
}

pub(super) fn default_rag_max_pages() -> usize {
    200
}

pub(super) fn default_rag_chunk_size() -> usize {
    1000
}

pub(super) fn default_rag_chunk_overlap() -> usize {
    200
}

pub(super) fn default_rag_top_k() -> usize {
    6
}

pub(super) fn default_rag_ingest_chunk_size() -> usize {
    256
}

pub(super) fn default_rag_ingest_chunk_overlap() -> usize {
    20
}

pub(super) fn default_rag_crawl_timeout_seconds() -> u64 {
    30
}
