//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory — called at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod openai_compatible;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML) and is `None`
/// for keyless local models. The scripted provider is built in code only.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(oai, api_key)?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> LlmConfig {
        crate::config::Config::test_default(std::path::Path::new("/tmp"))
            .llm
            .clone()
            .with_provider(provider)
    }

    impl LlmConfig {
        fn with_provider(mut self, provider: &str) -> Self {
            self.provider = provider.to_string();
            self
        }
    }

    #[test]
    fn builds_known_providers() {
        assert!(matches!(build(&config("dummy"), None), Ok(LlmProvider::Dummy(_))));
        assert!(matches!(
            build(&config("openai-compatible"), Some("k".into())),
            Ok(LlmProvider::OpenAiCompatible(_))
        ));
    }

    #[test]
    fn unknown_provider_errors() {
        let err = build(&config("gemini-magic"), None).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider(name) if name == "gemini-magic"));
    }

    #[test]
    fn scripted_provider_is_not_selectable_from_config() {
        let err = build(&config("scripted"), None).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider(name) if name == "scripted"));
    }
}
