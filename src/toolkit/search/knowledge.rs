use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use text_splitter::TextSplitter;
use tracing::{debug, info, warn};

use crate::core::error::Result;
use crate::db::store::{
    ProfileStore, VectorRecord, VectorStore, KIND_LECTURER_CHUNK, META_KIND, META_LECTURER_ID,
};
use crate::llm::embeddings::EmbeddingProvider;
use crate::toolkit::profile::models::{FIELD_BIO, FIELD_PUBLICATION_TITLES, FIELD_RESEARCH_INTERESTS};
use crate::toolkit::profile::{Profile, ProfileType};

pub const DEFAULT_CHUNK_SIZE: usize = 512;

pub const META_FIELD: &str = "field";
pub const META_FULL_NAME: &str = "full_name";

/// Lecturer fields turned into knowledge chunks, in indexing order.
pub const KNOWLEDGE_FIELDS: [&str; 3] = [FIELD_RESEARCH_INTERESTS, FIELD_PUBLICATION_TITLES, FIELD_BIO];


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeChunk {
    /// `{lecturer_id}:{field}:{n}`, stable across re-indexing.
    pub id: String,
    pub lecturer_id: String,
    pub field: String,
    pub text: String,
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSyncReport {
    pub lecturers: usize,
    pub chunks: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}


/// Splits lecturer text into chunks, embeds them and writes them to the vector store.
pub struct KnowledgeIndexer {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    splitter: TextSplitter<text_splitter::Characters>,
    chunk_size: usize,
}

impl KnowledgeIndexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, vectors: Arc<dyn VectorStore>) -> Self {
        Self::with_chunk_size(embedder, vectors, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        chunk_size: usize,
    ) -> Self {
        let chunk_size = chunk_size.max(1);
        info!(
            "KnowledgeIndexer initialized (chunk_size={}, model={})",
            chunk_size,
            embedder.model_name()
        );
        Self {
            embedder,
            vectors,
            splitter: TextSplitter::new(chunk_size),
            chunk_size,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_lecturer(&self, profile: &Profile) -> Vec<KnowledgeChunk> {
        let mut chunks = Vec::new();
        for field in KNOWLEDGE_FIELDS {
            let text = profile.field_text(field);
            if text.is_empty() {
                continue;
            }
            for (n, piece) in self.splitter.chunks(&text).enumerate() {
                chunks.push(KnowledgeChunk {
                    id: format!("{}:{}:{}", profile.id, field, n),
                    lecturer_id: profile.id.clone(),
                    field: field.to_string(),
                    text: piece.to_string(),
                });
            }
        }
        chunks
    }

    /// Returns the number of chunks written; zero for a lecturer without text.
    pub async fn index_lecturer(&self, profile: &Profile) -> Result<usize> {
        let chunks = self.chunk_lecturer(profile);
        if chunks.is_empty() {
            debug!("Lecturer {} has no knowledge text", profile.id);
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let records = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| VectorRecord {
                id: chunk.id,
                text: chunk.text,
                vector,
                metadata: BTreeMap::from([
                    (META_LECTURER_ID.to_string(), chunk.lecturer_id),
                    (META_KIND.to_string(), KIND_LECTURER_CHUNK.to_string()),
                    (META_FIELD.to_string(), chunk.field),
                    (META_FULL_NAME.to_string(), profile.full_name.clone()),
                ]),
            })
            .collect();

        let written = self.vectors.upsert(records).await?;
        debug!("Indexed {} knowledge chunks for lecturer {}", written, profile.id);
        Ok(written)
    }

    /// Indexes every lecturer. A lecturer whose embedding fails is reported and skipped.
    pub async fn index_all(&self, profiles: &dyn ProfileStore) -> Result<KnowledgeSyncReport> {
        let lecturers = profiles.list_profiles(ProfileType::Lecturer).await?;
        let mut report = KnowledgeSyncReport::default();

        for lecturer in &lecturers {
            match self.index_lecturer(lecturer).await {
                Ok(0) => report.skipped += 1,
                Ok(n) => {
                    report.lecturers += 1;
                    report.chunks += n;
                }
                Err(e) => {
                    warn!("Failed to index knowledge for {}: {}", lecturer.id, e);
                    report.failed.push(lecturer.id.clone());
                }
            }
        }

        info!(
            "Knowledge sync: {} lecturers, {} chunks, {} skipped, {} failed",
            report.lecturers,
            report.chunks,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryStore;
    use crate::db::store::{MetadataFilter, VectorQuery};
    use crate::testing::{sample_profiles, HashEmbedder};

    fn indexer(store: Arc<InMemoryStore>, chunk_size: usize) -> KnowledgeIndexer {
        KnowledgeIndexer::with_chunk_size(Arc::new(HashEmbedder::new(16)), store, chunk_size)
    }

    #[test]
    fn test_chunk_ids_and_fields() {
        let store = Arc::new(InMemoryStore::new());
        let profile = Profile::new("l9", ProfileType::Lecturer, "Trần Thị Bình")
            .with_field(FIELD_RESEARCH_INTERESTS, ["Machine learning", "Computer vision"])
            .with_field(FIELD_BIO, ["A".repeat(30)])
            .with_field("area_of_interest", ["Artificial Intelligence"]);

        let chunks = indexer(store, 20).chunk_lecturer(&profile);
        assert_eq!(chunks[0].id, "l9:research_interests:0");
        assert!(chunks.iter().all(|c| c.field != "area_of_interest"));
        assert!(chunks.iter().filter(|c| c.field == FIELD_BIO).count() >= 2);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 20));
    }

    #[tokio::test]
    async fn test_index_all_writes_filterable_chunks() {
        let store = Arc::new(InMemoryStore::new());
        for profile in sample_profiles() {
            store.insert_profile(profile);
        }
        let indexer = indexer(store.clone(), DEFAULT_CHUNK_SIZE);

        let report = indexer.index_all(store.as_ref()).await.unwrap();
        assert!(report.lecturers >= 2);
        assert!(report.failed.is_empty());
        assert_eq!(store.vector_count(), report.chunks);

        let hits = store
            .query(VectorQuery {
                vector: HashEmbedder::new(16).vector_for("machine learning"),
                top_k: 50,
                filter: Some(MetadataFilter::eq(META_KIND, KIND_LECTURER_CHUNK)),
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), report.chunks);
        assert!(hits.iter().all(|h| h.meta(META_LECTURER_ID).is_some()));
    }
}
