use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::base::{LlmMetadata, LlmProvider, LlmProviderError};
use super::ollama::OllamaProvider;
use crate::llm::stream::TextStream;

const DEFAULT_FALLBACK_URL: &str = "http://localhost:11434";
const DEFAULT_FALLBACK_MODEL: &str = "llama3.2";


/// Wraps a primary provider and retries failed calls against a local Ollama model.
pub struct LlmProviderWithFallback {
    primary: Arc<dyn LlmProvider>,
    fallback_enabled: bool,
    fallback_url: String,
    fallback_model: String,
    temperature: f64,

    fallback_provider: OnceCell<Arc<dyn LlmProvider>>,
    using_fallback: AtomicBool,
    fallback_count: AtomicUsize,
    primary_failures: AtomicUsize,
}

impl LlmProviderWithFallback {
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        fallback_enabled: bool,
        fallback_url: Option<String>,
        fallback_model: Option<String>,
        temperature: f64,
    ) -> Self {
        let fallback_url = fallback_url.unwrap_or_else(|| DEFAULT_FALLBACK_URL.to_string());
        let fallback_model = fallback_model.unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string());

        info!(
            "LlmProviderWithFallback initialized: primary={}, fallback={}/{}",
            primary.provider_name(),
            fallback_url,
            fallback_model
        );

        Self {
            primary,
            fallback_enabled,
            fallback_url,
            fallback_model,
            temperature,
            fallback_provider: OnceCell::new(),
            using_fallback: AtomicBool::new(false),
            fallback_count: AtomicUsize::new(0),
            primary_failures: AtomicUsize::new(0),
        }
    }

    /// Uses `fallback` instead of building an Ollama client on first failure.
    pub fn with_fallback_provider(mut self, fallback: Arc<dyn LlmProvider>) -> Self {
        self.fallback_provider = OnceCell::new_with(Some(fallback));
        self
    }

    async fn get_fallback_provider(&self) -> Arc<dyn LlmProvider> {
        self.fallback_provider
            .get_or_init(|| async {
                info!("Fallback provider initialized: {}/{}", self.fallback_url, self.fallback_model);
                Arc::new(OllamaProvider::new(
                    self.fallback_url.clone(),
                    self.fallback_model.clone(),
                    self.temperature,
                )) as Arc<dyn LlmProvider>
            })
            .await
            .clone()
    }

    fn record_primary_failure(&self, error: &LlmProviderError) {
        let failures = self.primary_failures.fetch_add(1, Ordering::SeqCst) + 1;
        warn!("Primary LLM provider failed ({}x): {}", failures, error);
    }

    fn record_fallback_success(&self) {
        self.using_fallback.store(true, Ordering::SeqCst);
        let total = self.fallback_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Fallback successful! total_fallbacks={}", total);
    }

    fn record_primary_success(&self) {
        self.using_fallback.store(false, Ordering::SeqCst);
        self.primary_failures.store(0, Ordering::SeqCst);
    }

    async fn fallback_generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        response_format: Option<&str>,
        original_error: &LlmProviderError,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        warn!(
            "Falling back to Ollama ({}/{}) due to: {}",
            self.fallback_url, self.fallback_model, original_error
        );

        let fallback = self.get_fallback_provider().await;
        let (content, mut metadata) = fallback
            .generate(system_prompt, user_prompt, response_format)
            .await?;

        metadata.fallback_used = true;
        metadata.original_provider = Some(self.primary.provider_name().to_string());
        metadata.original_error = Some(original_error.to_string());

        self.record_fallback_success();
        Ok((content, metadata))
    }

    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::SeqCst)
    }

    pub fn fallback_count(&self) -> usize {
        self.fallback_count.load(Ordering::SeqCst)
    }

    pub fn primary_failures(&self) -> usize {
        self.primary_failures.load(Ordering::SeqCst)
    }

    pub fn reset_fallback_state(&self) {
        self.using_fallback.store(false, Ordering::SeqCst);
        self.primary_failures.store(0, Ordering::SeqCst);
        info!("Fallback state reset");
    }
}

#[async_trait]
impl LlmProvider for LlmProviderWithFallback {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        response_format: Option<&str>,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        match self.primary.generate(system_prompt, user_prompt, response_format).await {
            Ok(result) => {
                self.record_primary_success();
                Ok(result)
            }
            Err(e) => {
                self.record_primary_failure(&e);
                if self.fallback_enabled {
                    self.fallback_generate(system_prompt, user_prompt, response_format, &e).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn generate_stream(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<TextStream, LlmProviderError> {
        match self.primary.generate_stream(system_prompt, user_prompt).await {
            Ok(stream) => {
                self.record_primary_success();
                Ok(stream)
            }
            Err(e) => {
                self.record_primary_failure(&e);
                if !self.fallback_enabled {
                    return Err(e);
                }
                warn!("Falling back to Ollama stream due to: {}", e);
                let stream = self
                    .get_fallback_provider()
                    .await
                    .generate_stream(system_prompt, user_prompt)
                    .await?;
                self.record_fallback_success();
                Ok(stream)
            }
        }
    }

    fn provider_name(&self) -> &str {
        if self.using_fallback.load(Ordering::SeqCst) {
            "ollama (fallback)"
        } else {
            self.primary.provider_name()
        }
    }

    fn model_name(&self) -> &str {
        if self.using_fallback.load(Ordering::SeqCst) {
            &self.fallback_model
        } else {
            self.primary.model_name()
        }
    }
}
