use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::{OntomatchConfig, StorageBackend};
use super::error::{OntomatchError, Result, ValidationIssue};
use crate::db::{
    CandidateStore, ConceptStore, HelixClient, HelixStore, InMemoryStore, Page, ProfileStore,
    VectorRecord, VectorStore, KIND_CONCEPT, META_KIND,
};
use crate::llm::embeddings::EmbeddingProvider;
use crate::llm::factory::{EmbeddingProviderFactory, LlmProviderFactory};
use crate::llm::providers::base::LlmProvider;
use crate::toolkit::evolution::{
    ApprovalOutcome, ApproveCandidateRequest, CandidateCuration, CandidateDetectionJob,
    CandidateDetector, CandidateQuery, ConceptCandidate, DetectionOptions, JobOutcome,
    RejectCandidateRequest,
};
use crate::toolkit::matching::{
    match_concepts, rank_matches, Explanation, MatchExplainer, MatchOptions, MatchResult,
    ProfileMatch, RankOptions,
};
use crate::toolkit::ontology::{
    Concept, ConceptIndexService, ExtractedConcept, HierarchyTraverser, OntologyError,
    OntologyStats, SeedReport, TaxonomyLoader,
};
use crate::toolkit::profile::{extract_concepts, ExtractionOptions, Profile, ProfileType};
use crate::toolkit::search::{
    HybridSearcher, KnowledgeIndexer, KnowledgeSyncReport, SearchOptions, SearchResponse,
};

/// Metadata key carrying the concept key of a `kind=concept` vector record.
pub const META_CONCEPT_KEY: &str = "concept_key";


/// Storage seams used by the client. The in-memory and Helix stores implement all four.
#[derive(Clone)]
pub struct Stores {
    pub concepts: Arc<dyn ConceptStore>,
    pub candidates: Arc<dyn CandidateStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub vectors: Arc<dyn VectorStore>,
}

impl Stores {
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ConceptStore + CandidateStore + ProfileStore + VectorStore + 'static,
    {
        Self {
            concepts: store.clone(),
            candidates: store.clone(),
            profiles: store.clone(),
            vectors: store,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceReport {
    pub profile_id: String,
    pub profile_type: ProfileType,
    pub concepts: Vec<ExtractedConcept>,
    /// Concept key to its label path, e.g. `Information Technology > Artificial Intelligence`.
    pub breadcrumbs: BTreeMap<String, String>,
    pub unmatched_tokens: Vec<String>,
    pub unmatched_by_field: BTreeMap<String, Vec<String>>,
    pub used_trie: bool,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub lecturer_id: String,
    pub full_name: String,
    pub result: MatchResult,
    pub explanation: Explanation,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub student_id: String,
    pub student_name: String,
    pub student_concepts: Vec<String>,
    pub lecturers_considered: usize,
    pub recommendations: Vec<Recommendation>,
}


#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingSyncReport {
    pub embedded: usize,
    pub skipped: usize,
    pub vectors_written: usize,
}


/// Entry point wiring stores, providers, the concept index and every workflow on top.
pub struct OntomatchClient {
    config: OntomatchConfig,
    stores: Stores,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<ConceptIndexService>,
    searcher: HybridSearcher,
    knowledge: KnowledgeIndexer,
    explainer: MatchExplainer,
    curation: CandidateCuration,
    job: Arc<CandidateDetectionJob>,
}

impl OntomatchClient {
    /// Builds stores and providers from configuration. The index stays empty until
    /// [`initialize`](Self::initialize).
    pub fn new(config: OntomatchConfig) -> Result<Self> {
        config.validate().map_err(OntomatchError::Validation)?;

        let stores = match config.storage_backend {
            StorageBackend::Memory => {
                let store = Arc::new(InMemoryStore::new());
                if let Some(path) = &config.profiles_path {
                    store.load_profiles(path)?;
                }
                Stores::shared(store)
            }
            StorageBackend::Helix => {
                let client = Arc::new(HelixClient::from_config(&config));
                Stores::shared(Arc::new(HelixStore::new(client)))
            }
        };
        let embedder = EmbeddingProviderFactory::from_config(&config);
        let llm = LlmProviderFactory::from_config(&config)?;

        Ok(Self::with_components(config, stores, embedder, llm))
    }

    pub fn with_components(
        config: OntomatchConfig,
        stores: Stores,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        let index = Arc::new(ConceptIndexService::new());

        let searcher = HybridSearcher::new(
            stores.profiles.clone(),
            stores.vectors.clone(),
            embedder.clone(),
            index.clone(),
            llm.clone(),
            config.search.clone(),
        );
        let knowledge = KnowledgeIndexer::with_chunk_size(
            embedder.clone(),
            stores.vectors.clone(),
            config.search.chunk_size,
        );
        let explainer = MatchExplainer::new(llm, config.matching.explain_max_chars);
        let curation = CandidateCuration::new(stores.candidates.clone(), stores.concepts.clone());
        let job = Arc::new(CandidateDetectionJob::new(
            stores.profiles.clone(),
            index.clone(),
            CandidateDetector::new(stores.candidates.clone(), DetectionOptions::from(&config.evolution)),
            Self::extraction_options(&config),
        ));

        info!(
            "OntomatchClient ready (storage={}, embeddings={})",
            config.storage_backend,
            embedder.model_name()
        );

        Self {
            config,
            stores,
            embedder,
            index,
            searcher,
            knowledge,
            explainer,
            curation,
            job,
        }
    }

    fn extraction_options(config: &OntomatchConfig) -> ExtractionOptions {
        ExtractionOptions {
            min_depth: config.matching.min_depth,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &OntomatchConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<ConceptIndexService> {
        &self.index
    }

    /// Seeds the taxonomy when the concept store is empty, then loads the index.
    pub async fn initialize(&self) -> Result<OntologyStats> {
        if self.stores.concepts.list_concepts().await?.is_empty() {
            let concepts = match &self.config.taxonomy_path {
                Some(path) => TaxonomyLoader::from_path(path),
                None => TaxonomyLoader::builtin(),
            }
            .map_err(OntologyError::from)?;
            info!("Concept store empty, seeding {} concepts", concepts.len());
            TaxonomyLoader::seed(self.stores.concepts.as_ref(), concepts).await?;
        }
        self.reload_index().await
    }

    pub async fn reload_index(&self) -> Result<OntologyStats> {
        let stats = self.index.reload_from_store(self.stores.concepts.as_ref()).await?;
        self.searcher.clear_cache();
        Ok(stats)
    }

    async fn require_profile(&self, id: &str) -> Result<Profile> {
        self.stores
            .profiles
            .get_profile(id)
            .await?
            .ok_or_else(|| OntomatchError::not_found("profile", id))
    }

    fn require_ready(&self) -> Result<()> {
        if self.index.is_ready() {
            Ok(())
        } else {
            Err(OntomatchError::InvalidState("concept index is not loaded".to_string()))
        }
    }

    /// Extracts concepts for one profile and stores the extract on it.
    pub async fn infer_concepts(&self, profile_id: &str) -> Result<InferenceReport> {
        self.require_ready()?;
        let profile = self.require_profile(profile_id).await?;
        let index = self.index.snapshot();

        let result = extract_concepts(&profile, &index, &Self::extraction_options(&self.config))?;
        self.stores
            .profiles
            .save_ontology_extract(&profile.id, result.to_extract(&index))
            .await?;

        info!(
            "🧩 Inferred {} concepts for {} ({} unmatched)",
            result.concepts.len(),
            profile.id,
            result.unmatched_tokens.len()
        );
        let traverser = HierarchyTraverser::new(&index);
        let breadcrumbs = result
            .concepts
            .iter()
            .map(|c| (c.key.clone(), traverser.breadcrumb(&c.key).join(" > ")))
            .collect();
        Ok(InferenceReport {
            profile_id: profile.id,
            profile_type: profile.profile_type,
            concepts: result.concepts,
            breadcrumbs,
            unmatched_tokens: result.unmatched_tokens,
            unmatched_by_field: result.unmatched_by_field,
            used_trie: result.used_trie,
        })
    }

    /// Matches a student against every lecturer, ranks the matches and explains each.
    pub async fn recommend_for_student(
        &self,
        student_id: &str,
        limit: Option<usize>,
    ) -> Result<RecommendationReport> {
        self.require_ready()?;
        let student = self.require_profile(student_id).await?;
        if student.profile_type != ProfileType::Student {
            return Err(OntomatchError::Validation(vec![ValidationIssue::new(
                "student_id",
                format!("profile {} is not a student", student.id),
            )]));
        }

        let index = self.index.snapshot();
        let extraction = Self::extraction_options(&self.config);
        let student_concepts = extract_concepts(&student, &index, &extraction)?.concepts;
        let match_options = MatchOptions::from(&self.config.matching);

        let lecturers = self.stores.profiles.list_profiles(ProfileType::Lecturer).await?;
        let mut matches = Vec::new();
        for lecturer in &lecturers {
            let concepts = match extract_concepts(lecturer, &index, &extraction) {
                Ok(result) => result.concepts,
                Err(OntomatchError::EmptyProfile(_)) => {
                    debug!("Lecturer {} has no extractable text", lecturer.id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(result) = match_concepts(&student_concepts, &concepts, &match_options) {
                matches.push(ProfileMatch {
                    profile_id: lecturer.id.clone(),
                    full_name: lecturer.full_name.clone(),
                    result,
                });
            }
        }

        let mut rank = RankOptions::from(&self.config.matching);
        if let Some(limit) = limit {
            rank.top_n = limit;
        }
        let ranked = rank_matches(matches, &rank);

        let mut recommendations = Vec::with_capacity(ranked.len());
        for m in ranked {
            let explanation = self
                .explainer
                .explain(&student.full_name, &m.full_name, &m.result)
                .await;
            recommendations.push(Recommendation {
                lecturer_id: m.profile_id,
                full_name: m.full_name,
                result: m.result,
                explanation,
            });
        }

        info!(
            "🎓 {} recommendations for {} out of {} lecturers",
            recommendations.len(),
            student.id,
            lecturers.len()
        );
        Ok(RecommendationReport {
            student_id: student.id,
            student_name: student.full_name,
            student_concepts: student_concepts.into_iter().map(|c| c.key).collect(),
            lecturers_considered: lecturers.len(),
            recommendations,
        })
    }

    pub async fn recommend_for_query(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        self.searcher.search(query, options).await
    }

    pub fn search_options(&self, limit: Option<usize>) -> SearchOptions {
        let options = SearchOptions::from(&self.config.search);
        match limit {
            Some(limit) => options.with_limit(limit),
            None => options,
        }
    }

    pub async fn list_candidates(&self, query: &CandidateQuery) -> Result<Page<ConceptCandidate>> {
        self.curation.list(query).await
    }

    pub async fn get_candidate(&self, id: Uuid) -> Result<ConceptCandidate> {
        self.curation.get(id).await
    }

    /// Approves the candidate, embeds the new concept when the provider allows it and
    /// reloads the index so the concept resolves immediately.
    pub async fn approve_candidate(&self, request: ApproveCandidateRequest) -> Result<ApprovalOutcome> {
        let mut outcome = self.curation.approve(request).await?;

        match self.embed_concepts(vec![outcome.concept.clone()]).await {
            Ok(mut embedded) => {
                if let Some(concept) = embedded.pop() {
                    outcome.concept = concept;
                }
            }
            Err(e) => warn!("Approved concept {} left without embedding: {}", outcome.concept.key, e),
        }

        self.reload_index().await?;
        Ok(outcome)
    }

    pub async fn reject_candidate(&self, request: RejectCandidateRequest) -> Result<ConceptCandidate> {
        self.curation.reject(request).await
    }

    pub async fn delete_candidate(&self, id: Uuid) -> Result<()> {
        self.curation.delete(id).await
    }

    /// Validates and upserts a taxonomy, then reloads the index.
    pub async fn seed_taxonomy(&self, concepts: Vec<Concept>) -> Result<SeedReport> {
        TaxonomyLoader::validate(&concepts).map_err(OntologyError::from)?;
        let report = TaxonomyLoader::seed(self.stores.concepts.as_ref(), concepts).await?;
        self.reload_index().await?;
        Ok(report)
    }

    /// Embeds concepts lacking an embedding (all of them with `force`), writes them back
    /// and mirrors them into the vector store as `kind=concept` records.
    pub async fn sync_taxonomy_embeddings(&self, force: bool) -> Result<EmbeddingSyncReport> {
        let concepts = self.stores.concepts.list_concepts().await?;
        let (pending, ready): (Vec<Concept>, Vec<Concept>) = concepts
            .into_iter()
            .partition(|c| force || c.embedding.is_none());

        let mut report = EmbeddingSyncReport {
            skipped: ready.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            return Ok(report);
        }

        let embedded = self.embed_concepts(pending).await?;
        report.embedded = embedded.len();
        report.vectors_written = embedded.len();

        self.reload_index().await?;
        info!(
            "📐 Concept embeddings synced: embedded={}, skipped={}",
            report.embedded, report.skipped
        );
        Ok(report)
    }

    async fn embed_concepts(&self, concepts: Vec<Concept>) -> Result<Vec<Concept>> {
        let texts: Vec<String> = concepts.iter().map(Concept::embedding_text).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let mut embedded = Vec::with_capacity(concepts.len());
        let mut records = Vec::with_capacity(concepts.len());
        for ((concept, text), vector) in concepts.into_iter().zip(texts).zip(vectors) {
            records.push(VectorRecord {
                id: format!("concept:{}", concept.key),
                text,
                vector: vector.clone(),
                metadata: BTreeMap::from([
                    (META_KIND.to_string(), KIND_CONCEPT.to_string()),
                    (META_CONCEPT_KEY.to_string(), concept.key.clone()),
                ]),
            });
            let concept = concept.with_embedding(vector);
            self.stores.concepts.upsert_concept(concept.clone()).await?;
            embedded.push(concept);
        }
        self.stores.vectors.upsert(records).await?;
        Ok(embedded)
    }

    /// Re-indexes one lecturer's knowledge chunks, or every lecturer's.
    pub async fn sync_lecturer_knowledge(&self, lecturer_id: Option<&str>) -> Result<KnowledgeSyncReport> {
        let report = match lecturer_id {
            Some(id) => {
                let profile = self.require_profile(id).await?;
                if profile.profile_type != ProfileType::Lecturer {
                    return Err(OntomatchError::Validation(vec![ValidationIssue::new(
                        "lecturer_id",
                        format!("profile {} is not a lecturer", profile.id),
                    )]));
                }
                let chunks = self.knowledge.index_lecturer(&profile).await?;
                KnowledgeSyncReport {
                    lecturers: usize::from(chunks > 0),
                    chunks,
                    skipped: usize::from(chunks == 0),
                    failed: Vec::new(),
                }
            }
            None => self.knowledge.index_all(self.stores.profiles.as_ref()).await?,
        };
        self.searcher.clear_cache();
        Ok(report)
    }

    pub async fn run_candidate_detection(&self) -> Result<JobOutcome> {
        self.job.run().await
    }

    /// Runs candidate detection on the configured interval until `shutdown` flips.
    pub fn spawn_detection_schedule(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        CandidateDetectionJob::spawn_schedule(self.job.clone(), self.config.evolution.job_interval(), shutdown)
    }
}
