//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `BERRY_*` and `LLM_API_KEY` env overrides.
//!
//! # Module layout
//!
//! - **types** — Public configuration structs consumed by subsystems
//!   (`Config`, `LlmConfig`, `AgentsConfig`, etc.).
//! - **raw** — Raw TOML deserialization types (`RawConfig`, `RawLlm`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load** — Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{EnvOverrides, expand_home, load, load_from};
pub use types::*;

impl Config {
    /// Safe `Config` for tests — dummy LLM, local store, no external calls.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            local: true,
            http: HttpConfig {
                coordinator: "127.0.0.1:0".into(),
                knowledge_base: "127.0.0.1:0".into(),
                rag: "127.0.0.1:0".into(),
                port_override: None,
            },
            store: StoreConfig {
                project_id: "test".into(),
                session_entity: raw::default_session_entity(),
            },
            agents: AgentsConfig {
                max_steps: raw::default_max_steps(),
                max_attempts: raw::default_max_attempts(),
                max_history_tokens: raw::default_max_history_tokens(),
                prompts_dir: std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
                    .join("config/prompts"),
            },
            tools: ToolsConfig {
                coordinator: ToolEndpoint {
                    url: "http://127.0.0.1:0/".into(),
                    explicit: false,
                },
                knowledge_base: ToolEndpoint {
                    url: "http://127.0.0.1:0/".into(),
                    explicit: false,
                },
                identity_endpoint: raw::default_identity_endpoint(),
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    embeddings_url: "http://localhost:0/v1/embeddings".into(),
                    model: "test-model".into(),
                    embedding_model: "test-embedding".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                    max_tokens: None,
                },
            },
            llm_api_key: None,
            rag: RagConfig {
                root_url: "http://127.0.0.1:0/guides/".into(),
                max_depth: raw::default_rag_max_depth(),
                max_pages: 10,
                chunk_size: raw::default_rag_chunk_size(),
                chunk_overlap: raw::default_rag_chunk_overlap(),
                top_k: raw::default_rag_top_k(),
                ingest_chunk_size: raw::default_rag_ingest_chunk_size(),
                ingest_chunk_overlap: raw::default_rag_ingest_chunk_overlap(),
                crawl_timeout_seconds: 1,
                crawl_on_start: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const MINIMAL_TOML: &str = r#"
[service]
work_dir = "~/.berry"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn no_env() -> EnvOverrides {
        EnvOverrides::default()
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), &no_env()).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.local);
        assert_eq!(cfg.agents.max_steps, 15);
        assert_eq!(cfg.agents.max_attempts, 2);
        assert_eq!(cfg.agents.max_history_tokens, 8192);
        assert_eq!(cfg.store.session_entity, "session");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = write_toml("");
        let cfg = load_from(f.path(), &no_env()).unwrap();
        assert_eq!(cfg.http.coordinator, "0.0.0.0:8080");
        assert_eq!(cfg.http.knowledge_base, "0.0.0.0:8081");
        assert_eq!(cfg.rag.top_k, 6);
        assert_eq!(cfg.rag.max_depth, 2);
        assert_eq!(cfg.rag.chunk_size, 1000);
        assert_eq!(cfg.rag.chunk_overlap, 200);
        assert_eq!(cfg.llm.provider, "dummy");
    }

    #[test]
    fn default_tool_endpoints_are_not_explicit() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), &no_env()).unwrap();
        assert_eq!(cfg.tools.coordinator.url, "http://localhost:8080/");
        assert_eq!(cfg.tools.knowledge_base.url, "http://localhost:8081/");
        assert!(!cfg.tools.coordinator.explicit);
        assert!(!cfg.tools.knowledge_base.explicit);
    }

    #[test]
    fn env_tool_url_wins_over_file() {
        let toml = r#"
[tools]
knowledge_base_url = "http://kb.internal/"
"#;
        let f = write_toml(toml);
        let env = EnvOverrides {
            knowledge_base_url: Some("https://kb.run.app/".into()),
            ..EnvOverrides::default()
        };
        let cfg = load_from(f.path(), &env).unwrap();
        assert_eq!(cfg.tools.knowledge_base.url, "https://kb.run.app/");
        assert!(cfg.tools.knowledge_base.explicit);
    }

    #[test]
    fn file_tool_url_is_explicit() {
        let toml = r#"
[tools]
coordinator_url = "http://coordinator.internal/"
"#;
        let f = write_toml(toml);
        let cfg = load_from(f.path(), &no_env()).unwrap();
        assert!(cfg.tools.coordinator.explicit);
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.berry");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".berry"));
    }

    #[test]
    fn absolute_path_unchanged() {
        let p = expand_home("/absolute/path");
        assert_eq!(p, std::path::PathBuf::from("/absolute/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(std::path::Path::new("/nonexistent/config.toml"), &no_env());
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn any_local_value_enables_local_mode() {
        for value in ["1", "true", "false", "0", "no"] {
            let env = EnvOverrides::from_lookup(|name| {
                (name == "BERRY_LOCAL").then(|| value.to_string())
            });
            assert_eq!(env.local, Some(true), "BERRY_LOCAL={value}");
        }
        let blank = EnvOverrides::from_lookup(|name| (name == "BERRY_LOCAL").then(|| " ".to_string()));
        assert_eq!(blank.local, None);
        assert_eq!(EnvOverrides::from_lookup(|_| None).local, None);
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(MINIMAL_TOML);
        let env = EnvOverrides {
            work_dir: Some("/tmp/test-override".into()),
            log_level: Some("debug".into()),
            local: Some(true),
            project_id: Some("proj_1".into()),
            session_entity: Some("chat_sessions".into()),
            ..EnvOverrides::default()
        };
        let cfg = load_from(f.path(), &env).unwrap();
        assert_eq!(cfg.work_dir, std::path::PathBuf::from("/tmp/test-override"));
        assert_eq!(cfg.log_level, "debug");
        assert!(cfg.local);
        assert_eq!(cfg.store.project_id, "proj_1");
        assert_eq!(cfg.store.session_entity, "chat_sessions");
        assert_eq!(
            cfg.session_db_path(),
            std::path::PathBuf::from("/tmp/test-override/proj_1.sqlite3")
        );
    }

    #[test]
    fn invalid_session_entity_rejected() {
        let f = write_toml("[store]\nsession_entity = \"drop table;\"\n");
        let msg = load_from(f.path(), &no_env()).unwrap_err().to_string();
        assert!(msg.contains("session_entity"));
    }

    #[test]
    fn http_port_override_keeps_host() {
        let f = write_toml(MINIMAL_TOML);
        let env = EnvOverrides {
            http_port: Some("9090".into()),
            ..EnvOverrides::default()
        };
        let cfg = load_from(f.path(), &env).unwrap();
        assert_eq!(cfg.http.effective_bind(&cfg.http.knowledge_base), "0.0.0.0:9090");
    }

    #[test]
    fn bad_http_port_errors() {
        let f = write_toml(MINIMAL_TOML);
        let env = EnvOverrides {
            http_port: Some("eighty".into()),
            ..EnvOverrides::default()
        };
        assert!(load_from(f.path(), &env).is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let f = write_toml("[rag]\nchunk_size = 100\nchunk_overlap = 100\n");
        assert!(load_from(f.path(), &no_env()).is_err());
    }

    const BASE_TOML: &str = r#"
[service]
work_dir = "~/.berry"
log_level = "info"

[llm]
default = "dummy"

[llm.openai]
model = "gpt-base"
temperature = 0.1
timeout_seconds = 30
api_base_url = "https://api.openai.com/v1/chat/completions"
"#;

    fn write_named(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn overlay_wins_scalar_and_keeps_base_fields() {
        let dir = TempDir::new().unwrap();
        write_named(&dir, "base.toml", BASE_TOML);
        let overlay = r#"
[meta]
base = "base.toml"

[llm.openai]
model = "gpt-overlay"
"#;
        let overlay_path = write_named(&dir, "overlay.toml", overlay);
        let cfg = load_from(&overlay_path, &no_env()).unwrap();
        assert_eq!(cfg.llm.openai.model, "gpt-overlay");
        assert_eq!(cfg.llm.openai.temperature, 0.1);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn cycle_detection() {
        let dir = TempDir::new().unwrap();
        let self_path = dir.path().join("self.toml");
        let content = format!("[meta]\nbase = \"{}\"\n\n{BASE_TOML}", self_path.display());
        std::fs::write(&self_path, content).unwrap();
        let msg = load_from(&self_path, &no_env()).unwrap_err().to_string();
        assert!(msg.contains("circular"));
    }

    #[test]
    fn shipped_default_config_parses() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let cfg = load_from(&path, &no_env()).unwrap();
        assert_eq!(cfg.agents.max_steps, 15);
        assert_eq!(cfg.rag.top_k, 6);
    }
}
