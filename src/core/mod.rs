pub mod cache;
pub mod config;
pub mod error;
pub mod ontomatch_client;

pub use cache::{CacheStats, ResultCache};
pub use config::{EvolutionConfig, MatchingConfig, OntomatchConfig, SearchConfig, StorageBackend};
pub use error::{ErrorKind, OntomatchError, Result, ValidationIssue};
pub use ontomatch_client::{
    EmbeddingSyncReport, InferenceReport, OntomatchClient, Recommendation, RecommendationReport,
    Stores,
};
