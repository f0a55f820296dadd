pub mod base;
pub mod cerebras;
pub mod fallback;
pub mod ollama;

pub use base::{LlmMetadata, LlmProvider, LlmProviderError};
pub use cerebras::CerebrasProvider;
pub use fallback::LlmProviderWithFallback;
pub use ollama::OllamaProvider;
