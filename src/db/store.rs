use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::Result;
use crate::toolkit::evolution::{CandidateQuery, ConceptCandidate};
use crate::toolkit::ontology::Concept;
use crate::toolkit::profile::{OntologyExtract, Profile, ProfileType};

/// Metadata key linking a vector record to its owning lecturer.
pub const META_LECTURER_ID: &str = "lecturer_id";
/// Metadata key distinguishing record families in the shared vector pool.
pub const META_KIND: &str = "kind";
pub const KIND_LECTURER_CHUNK: &str = "lecturer_chunk";
pub const KIND_CONCEPT: &str = "concept";


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl VectorHit {
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MetadataFilter {
    Eq { field: String, value: String },
    In { field: String, values: Vec<String> },
}

impl MetadataFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = String>) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().collect(),
        }
    }

    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Eq { field, value } => metadata.get(field) == Some(value),
            Self::In { field, values } => metadata
                .get(field)
                .is_some_and(|actual| values.iter().any(|v| v == actual)),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}


#[async_trait]
pub trait ConceptStore: Send + Sync {
    async fn list_concepts(&self) -> Result<Vec<Concept>>;

    async fn find_concept(&self, key: &str) -> Result<Option<Concept>>;

    /// Fails with `Conflict` when the key is taken.
    async fn insert_concept(&self, concept: Concept) -> Result<()>;

    async fn upsert_concept(&self, concept: Concept) -> Result<UpsertOutcome>;
}


#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn find_candidate(&self, id: Uuid) -> Result<Option<ConceptCandidate>>;

    async fn find_by_canonical(&self, canonical: &str) -> Result<Option<ConceptCandidate>>;

    /// Inserts or replaces the candidate with the same canonical token.
    async fn save_candidate(&self, candidate: ConceptCandidate) -> Result<()>;

    async fn list_candidates(&self, query: &CandidateQuery) -> Result<Page<ConceptCandidate>>;

    async fn delete_candidate(&self, id: Uuid) -> Result<bool>;
}


#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>>;

    async fn list_profiles(&self, profile_type: ProfileType) -> Result<Vec<Profile>>;

    /// Profiles with `updated_at` after `since`; every profile when `since` is `None`.
    async fn list_updated_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Profile>>;

    async fn save_ontology_extract(&self, profile_id: &str, extract: OntologyExtract) -> Result<()>;
}


#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns the number of records written.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize>;

    /// Highest-similarity records first.
    async fn query(&self, query: VectorQuery) -> Result<Vec<VectorHit>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_metadata_filters() {
        let m = meta(&[("kind", "lecturer_chunk"), ("lecturer_id", "l2")]);
        assert!(MetadataFilter::eq("kind", "lecturer_chunk").matches(&m));
        assert!(!MetadataFilter::eq("kind", "concept").matches(&m));
        assert!(MetadataFilter::any_of("lecturer_id", ["l1".to_string(), "l2".to_string()]).matches(&m));
        assert!(!MetadataFilter::any_of("missing", ["l2".to_string()]).matches(&m));
    }

    #[test]
    fn test_filter_serialization() {
        let json = serde_json::to_value(MetadataFilter::eq("kind", "concept")).unwrap();
        assert_eq!(json["op"], "eq");
        assert_eq!(json["field"], "kind");
    }

    #[test]
    fn test_total_pages() {
        let page: Page<u8> = Page {
            items: vec![],
            total: 41,
            page: 1,
            page_size: 20,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
