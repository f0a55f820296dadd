pub mod hierarchy;
pub mod index;
pub mod loader;
pub mod models;
pub mod service;
pub mod trie;

pub use hierarchy::HierarchyTraverser;
pub use index::{ConceptHit, ConceptIndex, MatchMethod};
pub use loader::{LoaderError, SeedReport, TaxonomyLoader};
pub use models::{Concept, ExtractedConcept, OntologyStats};
pub use service::ConceptIndexService;
pub use trie::{ConceptTrie, ScoredConcept, TrieEntry};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OntologyError {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
    #[error("Duplicate concept key: {0}")]
    DuplicateKey(String),
    #[error("Invalid concept key: {0}")]
    InvalidKey(String),
    #[error("Trie snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
