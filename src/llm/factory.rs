use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::embeddings::{EmbeddingGenerator, EmbeddingProvider, RetryPolicy};
use super::providers::base::{LlmProvider, LlmProviderError};
use super::providers::cerebras::{CEREBRAS_BASE_URL, CerebrasProvider};
use super::providers::fallback::LlmProviderWithFallback;
use super::providers::ollama::OllamaProvider;
use crate::core::config::OntomatchConfig;
use crate::DEFAULT_OLLAMA_URL;


pub struct LlmProviderFactory;

impl LlmProviderFactory {
    pub fn create(
        provider: &str,
        model: &str,
        api_key: Option<&str>,
        base_url: Option<&str>,
        temperature: f64,
    ) -> Result<Arc<dyn LlmProvider>, LlmProviderError> {
        match provider.to_lowercase().as_str() {
            "cerebras" => Ok(Arc::new(CerebrasProvider::with_base_url(
                api_key.unwrap_or_default(),
                model,
                temperature,
                base_url.unwrap_or(CEREBRAS_BASE_URL),
            ))),
            "ollama" => Ok(Arc::new(OllamaProvider::new(
                base_url.unwrap_or(DEFAULT_OLLAMA_URL),
                model,
                temperature,
            ))),
            other => Err(LlmProviderError::UnknownProvider(other.to_string())),
        }
    }

    pub fn create_with_fallback(
        primary: Arc<dyn LlmProvider>,
        fallback_enabled: bool,
        fallback_url: Option<&str>,
        fallback_model: &str,
        fallback_temperature: f64,
    ) -> LlmProviderWithFallback {
        LlmProviderWithFallback::new(
            primary,
            fallback_enabled,
            fallback_url.map(String::from),
            Some(fallback_model.to_string()),
            fallback_temperature,
        )
    }

    /// `Ok(None)` when the LLM is switched off (`llm_provider = "none"`); the LLM-backed
    /// features then run their deterministic paths.
    pub fn from_config(
        config: &OntomatchConfig,
    ) -> Result<Option<Arc<dyn LlmProvider>>, LlmProviderError> {
        if !config.llm_enabled() {
            info!("LLM provider disabled by configuration");
            return Ok(None);
        }

        let temperature = f64::from(config.llm_temperature);
        let primary = Self::create(
            &config.llm_provider,
            &config.llm_model,
            config.llm_api_key.as_deref(),
            config.llm_base_url.as_deref(),
            temperature,
        )?;

        if !config.llm_fallback_enabled {
            return Ok(Some(primary));
        }

        Ok(Some(Arc::new(Self::create_with_fallback(
            primary,
            true,
            Some(&config.llm_fallback_url),
            &config.llm_fallback_model,
            temperature,
        ))))
    }
}


pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    #[must_use]
    pub fn from_config(config: &OntomatchConfig) -> Arc<dyn EmbeddingProvider> {
        let retry = RetryPolicy {
            max_attempts: config.embedding_max_attempts,
            initial_backoff: Duration::from_millis(config.embedding_initial_backoff_ms),
        };

        Arc::new(EmbeddingGenerator::new(
            config.embedding_provider.clone(),
            config.embedding_url.clone(),
            config.embedding_model.clone(),
            config.embedding_api_key.clone(),
            config.embedding_dimensions,
            config.timeout,
            config.embedding_cache_size,
            retry,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_provider() {
        let provider =
            LlmProviderFactory::create("ollama", "llama3.1:8b", None, None, 0.7).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "llama3.1:8b");
    }

    #[test]
    fn test_create_cerebras_provider() {
        let provider =
            LlmProviderFactory::create("cerebras", "llama-3.3-70b", Some("test-key"), None, 0.3)
                .unwrap();
        assert_eq!(provider.provider_name(), "cerebras");
    }

    #[test]
    fn test_unknown_provider_is_error() {
        let result = LlmProviderFactory::create("unknown", "model", None, None, 0.5);
        assert!(matches!(result, Err(LlmProviderError::UnknownProvider(_))));
    }

    #[test]
    fn test_from_config_respects_none_and_fallback() {
        let mut config = OntomatchConfig::default();
        config.llm_provider = "none".to_string();
        assert!(LlmProviderFactory::from_config(&config).unwrap().is_none());

        config.llm_provider = "ollama".to_string();
        config.llm_fallback_enabled = true;
        let provider = LlmProviderFactory::from_config(&config).unwrap().unwrap();
        assert_eq!(provider.provider_name(), "ollama");
    }

    #[test]
    fn test_embedding_factory_uses_configured_dimensions() {
        let mut config = OntomatchConfig::default();
        config.embedding_dimensions = 384;
        let provider = EmbeddingProviderFactory::from_config(&config);
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.model_name(), crate::DEFAULT_EMBEDDING_MODEL);
    }
}
