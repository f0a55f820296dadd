use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::index::ConceptIndex;
use super::models::{Concept, OntologyStats};
use super::OntologyError;
use crate::core::error::Result;
use crate::db::ConceptStore;

/// Owns the live [`ConceptIndex`]. Readers take a cheap `Arc` snapshot; a reload builds
/// the replacement without holding the lock and swaps it in whole.
pub struct ConceptIndexService {
    current: RwLock<Arc<ConceptIndex>>,
    generation: AtomicU64,
}

impl Default for ConceptIndexService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConceptIndexService {
    /// Starts with an empty, trie-less index until the first reload.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(ConceptIndex::empty())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_index(index: ConceptIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
            generation: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> Arc<ConceptIndex> {
        Arc::clone(&self.current.read())
    }

    /// True once a trie-backed index has been installed.
    pub fn is_ready(&self) -> bool {
        self.current.read().has_trie()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Builds a new index from `concepts` and swaps it in. On error the previous index
    /// stays in place.
    pub fn reload(&self, concepts: Vec<Concept>) -> std::result::Result<OntologyStats, OntologyError> {
        let index = match ConceptIndex::build(concepts) {
            Ok(index) => index,
            Err(e) => {
                warn!("Concept index rebuild failed, keeping previous index: {}", e);
                return Err(e);
            }
        };
        let stats = index.stats();

        *self.current.write() = Arc::new(index);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        info!(
            "🔄 Concept index swapped (generation={}, concepts={})",
            generation, stats.total_concepts
        );
        Ok(stats)
    }

    pub async fn reload_from_store(&self, store: &dyn ConceptStore) -> Result<OntologyStats> {
        let concepts = store.list_concepts().await?;
        Ok(self.reload(concepts)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;

    fn concepts() -> Vec<Concept> {
        vec![
            Concept::new("it", "Information Technology", vec![]),
            Concept::new("it.ai", "Artificial Intelligence", vec!["AI".to_string()]),
            Concept::new("it.ai.nlp", "NLP", vec!["xử lý ngôn ngữ".to_string()]),
        ]
    }

    #[test]
    fn test_starts_degraded() {
        let service = ConceptIndexService::new();
        assert!(!service.is_ready());
        assert!(service.snapshot().is_empty());
        assert_eq!(service.generation(), 0);
    }

    #[test]
    fn test_reload_swaps_and_keeps_old_snapshots() {
        let service = ConceptIndexService::new();
        let before = service.snapshot();

        let stats = service.reload(concepts()).unwrap();
        assert_eq!(stats.total_concepts, 3);
        assert!(service.is_ready());
        assert_eq!(service.generation(), 1);

        assert!(before.is_empty());
        assert_eq!(service.snapshot().resolve("ai")[0].concept_key, "it.ai");
    }

    #[test]
    fn test_failed_reload_keeps_previous_index() {
        let service = ConceptIndexService::new();
        service.reload(concepts()).unwrap();

        let mut broken = concepts();
        broken.push(Concept::new("it.ai", "dup", vec![]));
        assert!(service.reload(broken).is_err());
        assert_eq!(service.generation(), 1);
        assert_eq!(service.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn test_reload_from_store() {
        let store = InMemoryStore::new();
        for concept in concepts() {
            store.insert_concept(concept).await.unwrap();
        }
        let service = ConceptIndexService::new();
        let stats = service.reload_from_store(&store).await.unwrap();
        assert_eq!(stats.total_concepts, 3);
        assert_eq!(service.snapshot().resolve("xu ly ngon ngu")[0].concept_key, "it.ai.nlp");
    }
}
