pub mod embeddings;
pub mod factory;
pub mod json;
pub mod providers;
pub mod stream;

pub use embeddings::{EmbeddingError, EmbeddingGenerator, EmbeddingProvider, RetryPolicy};
pub use factory::{EmbeddingProviderFactory, LlmProviderFactory};
pub use providers::{LlmMetadata, LlmProvider, LlmProviderError};
pub use stream::{TextSender, TextStream};
