use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use super::store::{
    CandidateStore, ConceptStore, Page, ProfileStore, UpsertOutcome, VectorHit, VectorQuery,
    VectorRecord, VectorStore,
};
use crate::core::error::{OntomatchError, Result};
use crate::toolkit::evolution::{CandidateQuery, ConceptCandidate};
use crate::toolkit::ontology::Concept;
use crate::toolkit::profile::{OntologyExtract, Profile, ProfileType};
use crate::toolkit::similarity::cosine_similarity;

/// Process-local store behind every storage trait. Vector queries are brute-force
/// cosine over all records.
#[derive(Default)]
pub struct InMemoryStore {
    concepts: RwLock<BTreeMap<String, Concept>>,
    candidates: RwLock<HashMap<Uuid, ConceptCandidate>>,
    profiles: RwLock<BTreeMap<String, Profile>>,
    vectors: RwLock<BTreeMap<String, VectorRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.profiles.write().insert(profile.id.clone(), profile);
    }

    /// Loads a JSON array of profiles. Returns how many were read.
    pub fn load_profiles(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| OntomatchError::Storage(format!("{}: {}", path.display(), e)))?;
        let profiles: Vec<Profile> = serde_json::from_str(&json)?;
        let count = profiles.len();
        for profile in profiles {
            self.insert_profile(profile);
        }
        info!("Loaded {} profiles from {}", count, path.display());
        Ok(count)
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.read().len()
    }
}

#[async_trait]
impl ConceptStore for InMemoryStore {
    async fn list_concepts(&self) -> Result<Vec<Concept>> {
        Ok(self.concepts.read().values().cloned().collect())
    }

    async fn find_concept(&self, key: &str) -> Result<Option<Concept>> {
        Ok(self.concepts.read().get(key).cloned())
    }

    async fn insert_concept(&self, concept: Concept) -> Result<()> {
        let mut concepts = self.concepts.write();
        if concepts.contains_key(&concept.key) {
            return Err(OntomatchError::Conflict(format!(
                "concept {} already exists",
                concept.key
            )));
        }
        concepts.insert(concept.key.clone(), concept);
        Ok(())
    }

    async fn upsert_concept(&self, mut concept: Concept) -> Result<UpsertOutcome> {
        let mut concepts = self.concepts.write();
        let outcome = match concepts.get(&concept.key) {
            None => UpsertOutcome::Inserted,
            Some(existing)
                if existing.same_content(&concept)
                    && (concept.embedding.is_none() || existing.embedding == concept.embedding) =>
            {
                return Ok(UpsertOutcome::Unchanged);
            }
            Some(existing) => {
                if concept.embedding.is_none() {
                    concept.embedding = existing.embedding.clone();
                }
                UpsertOutcome::Updated
            }
        };
        concept.updated_at = Some(Utc::now());
        concepts.insert(concept.key.clone(), concept);
        Ok(outcome)
    }
}

#[async_trait]
impl CandidateStore for InMemoryStore {
    async fn find_candidate(&self, id: Uuid) -> Result<Option<ConceptCandidate>> {
        Ok(self.candidates.read().get(&id).cloned())
    }

    async fn find_by_canonical(&self, canonical: &str) -> Result<Option<ConceptCandidate>> {
        Ok(self
            .candidates
            .read()
            .values()
            .find(|c| c.canonical == canonical)
            .cloned())
    }

    async fn save_candidate(&self, candidate: ConceptCandidate) -> Result<()> {
        let mut candidates = self.candidates.write();
        candidates.retain(|id, c| c.canonical != candidate.canonical || *id == candidate.id);
        candidates.insert(candidate.id, candidate);
        Ok(())
    }

    async fn list_candidates(&self, query: &CandidateQuery) -> Result<Page<ConceptCandidate>> {
        let all: Vec<ConceptCandidate> = self.candidates.read().values().cloned().collect();
        Ok(query.apply(all))
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool> {
        Ok(self.candidates.write().remove(&id).is_some())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        Ok(self.profiles.read().get(id).cloned())
    }

    async fn list_profiles(&self, profile_type: ProfileType) -> Result<Vec<Profile>> {
        Ok(self
            .profiles
            .read()
            .values()
            .filter(|p| p.profile_type == profile_type)
            .cloned()
            .collect())
    }

    async fn list_updated_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Profile>> {
        Ok(self
            .profiles
            .read()
            .values()
            .filter(|p| match (since, p.updated_at) {
                (None, _) => true,
                (Some(since), Some(updated)) => updated > since,
                (Some(_), None) => false,
            })
            .cloned()
            .collect())
    }

    async fn save_ontology_extract(&self, profile_id: &str, extract: OntologyExtract) -> Result<()> {
        let mut profiles = self.profiles.write();
        let profile = profiles
            .get_mut(profile_id)
            .ok_or_else(|| OntomatchError::not_found("profile", profile_id))?;
        profile.ontology_extract = Some(extract);
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let mut vectors = self.vectors.write();
        let count = records.len();
        for record in records {
            vectors.insert(record.id.clone(), record);
        }
        Ok(count)
    }

    async fn query(&self, query: VectorQuery) -> Result<Vec<VectorHit>> {
        let vectors = self.vectors.read();
        let mut hits: Vec<VectorHit> = vectors
            .values()
            .filter(|r| query.filter.as_ref().is_none_or(|f| f.matches(&r.metadata)))
            .map(|r| VectorHit {
                id: r.id.clone(),
                text: r.text.clone(),
                score: cosine_similarity(&query.vector, &r.vector),
                metadata: r.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(query.top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MetadataFilter;

    fn record(id: &str, vector: Vec<f32>, lecturer: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: id.to_string(),
            vector,
            metadata: BTreeMap::from([("lecturer_id".to_string(), lecturer.to_string())]),
        }
    }

    #[tokio::test]
    async fn test_insert_conflict_and_upsert_outcomes() {
        let store = InMemoryStore::new();
        let concept = Concept::new("it.ai", "AI", vec![]);
        store.insert_concept(concept.clone()).await.unwrap();
        let err = store.insert_concept(concept.clone()).await.unwrap_err();
        assert!(matches!(err, OntomatchError::Conflict(_)));

        assert_eq!(store.upsert_concept(concept.clone()).await.unwrap(), UpsertOutcome::Unchanged);
        let renamed = Concept::new("it.ai", "Artificial Intelligence", vec![]);
        assert_eq!(store.upsert_concept(renamed).await.unwrap(), UpsertOutcome::Updated);
        let new = Concept::new("it.data", "Data", vec![]);
        assert_eq!(store.upsert_concept(new).await.unwrap(), UpsertOutcome::Inserted);
    }

    #[tokio::test]
    async fn test_upsert_keeps_existing_embedding() {
        let store = InMemoryStore::new();
        store
            .insert_concept(Concept::new("it.ai", "AI", vec![]).with_embedding(vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert_concept(Concept::new("it.ai", "AI!", vec![]))
            .await
            .unwrap();
        let stored = store.find_concept("it.ai").await.unwrap().unwrap();
        assert_eq!(stored.embedding, Some(vec![1.0, 0.0]));
    }

    #[tokio::test]
    async fn test_vector_query_filters_and_ranks() {
        let store = InMemoryStore::new();
        store
            .upsert(vec![
                record("a", vec![1.0, 0.0], "l1"),
                record("b", vec![0.9, 0.1], "l2"),
                record("c", vec![0.0, 1.0], "l1"),
            ])
            .await
            .unwrap();

        let hits = store
            .query(VectorQuery {
                vector: vec![1.0, 0.0],
                top_k: 2,
                filter: None,
            })
            .await
            .unwrap();
        assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

        let hits = store
            .query(VectorQuery {
                vector: vec![1.0, 0.0],
                top_k: 10,
                filter: Some(MetadataFilter::eq("lecturer_id", "l1")),
            })
            .await
            .unwrap();
        assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_save_candidate_is_keyed_by_canonical() {
        let store = InMemoryStore::new();
        let first = ConceptCandidate::new("blockchain", 1);
        store.save_candidate(first.clone()).await.unwrap();
        let replacement = ConceptCandidate::new("blockchain", 5);
        store.save_candidate(replacement.clone()).await.unwrap();

        assert!(store.find_candidate(first.id).await.unwrap().is_none());
        let found = store.find_by_canonical("blockchain").await.unwrap().unwrap();
        assert_eq!(found.frequency, 5);
        assert!(store.delete_candidate(replacement.id).await.unwrap());
        assert!(!store.delete_candidate(replacement.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_updated_since() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_profile(
            Profile::new("old", ProfileType::Student, "A").with_updated_at(now - chrono::Duration::days(2)),
        );
        store.insert_profile(Profile::new("new", ProfileType::Student, "B").with_updated_at(now));

        let since = now - chrono::Duration::days(1);
        let recent = store.list_updated_since(Some(since)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "new");
        assert_eq!(store.list_updated_since(None).await.unwrap().len(), 2);
    }
}
