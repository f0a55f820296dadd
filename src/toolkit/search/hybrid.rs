use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::diversity::select_diverse;
use super::models::{
    LecturerSearchResult, MatchType, QueryAnalysis, SearchOptions, SearchResponse, SearchStrategy,
};
use super::names::NameMatcher;
use super::query_processor::QueryProcessor;
use super::rerank::{pass_through, LlmReranker};
use super::threshold::score_threshold;
use crate::core::cache::{CacheStats, ResultCache};
use crate::core::config::SearchConfig;
use crate::core::error::{OntomatchError, Result, ValidationIssue};
use crate::db::store::{
    MetadataFilter, ProfileStore, VectorHit, VectorQuery, VectorStore, KIND_LECTURER_CHUNK,
    META_KIND, META_LECTURER_ID,
};
use crate::llm::embeddings::EmbeddingProvider;
use crate::llm::providers::base::LlmProvider;
use crate::toolkit::ontology::ConceptIndexService;
use crate::toolkit::profile::models::{FIELD_AREA_OF_INTEREST, FIELD_RESEARCH_INTERESTS};
use crate::toolkit::profile::{Profile, ProfileType};

/// Best chunk per lecturer: score and chunk text.
type ChunkScores = HashMap<String, (f64, String)>;

fn best_chunk_per_lecturer(hits: Vec<VectorHit>) -> ChunkScores {
    let mut best: ChunkScores = HashMap::new();
    for hit in hits {
        let Some(lecturer_id) = hit.meta(META_LECTURER_ID).map(str::to_string) else {
            continue;
        };
        let score = hit.score.max(0.0);
        match best.get(&lecturer_id) {
            Some((current, _)) if *current >= score => {}
            _ => {
                best.insert(lecturer_id, (score, hit.text));
            }
        }
    }
    best
}

fn base_result(profile: &Profile, match_type: MatchType) -> LecturerSearchResult {
    LecturerSearchResult {
        lecturer_id: profile.id.clone(),
        full_name: profile.full_name.clone(),
        name_match_score: 0.0,
        semantic_score: 0.0,
        final_score: 0.0,
        match_type,
        matched_chunk: None,
        research_interests: profile.field(FIELD_RESEARCH_INTERESTS).to_vec(),
        area_of_interest: profile.field(FIELD_AREA_OF_INTEREST).to_vec(),
    }
}


/// Name-first / semantic-only lecturer search with thresholding, diversity, optional
/// LLM rerank and a short-lived result cache.
pub struct HybridSearcher {
    profiles: Arc<dyn ProfileStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<ConceptIndexService>,
    processor: QueryProcessor,
    reranker: Option<LlmReranker>,
    cache: ResultCache<SearchResponse>,
    config: SearchConfig,
}

impl HybridSearcher {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<ConceptIndexService>,
        llm: Option<Arc<dyn LlmProvider>>,
        config: SearchConfig,
    ) -> Self {
        let analysis_llm = llm.clone().filter(|_| config.llm_query_analysis);
        let reranker = llm.map(|llm| {
            LlmReranker::new(llm).with_limits(config.rerank_candidates, config.rerank_min_score)
        });
        info!(
            "HybridSearcher initialized (weights name={:.2} semantic={:.2}, rerank={}, llm_analysis={})",
            config.name_weight,
            config.semantic_weight,
            reranker.is_some(),
            analysis_llm.is_some()
        );

        Self {
            profiles,
            vectors,
            embedder,
            index,
            processor: QueryProcessor::new(analysis_llm),
            reranker,
            cache: ResultCache::new(config.cache_max_entries, Duration::from_secs(config.cache_ttl_secs)),
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        let query = query.trim();
        let mut issues = Vec::new();
        if query.is_empty() {
            issues.push(ValidationIssue::new("query", "must not be empty"));
        }
        if options.limit == 0 {
            issues.push(ValidationIssue::new("limit", "must be at least 1"));
        }
        if !issues.is_empty() {
            return Err(OntomatchError::Validation(issues));
        }

        let cache_key = ResultCache::<SearchResponse>::make_key(query, &(&options, self.index.generation()));
        if options.use_cache {
            if let Some(mut cached) = self.cache.get(&cache_key) {
                debug!("Search cache hit for '{}'", crate::safe_truncate(query, 50));
                cached.cached = true;
                return Ok(cached);
            }
        }

        let index = self.index.snapshot();
        let analysis = self.processor.analyze_with_llm(query, &index).await;
        let threshold = score_threshold(analysis.has_name(), analysis.concept_keys.len());

        let (strategy, candidates) = match self.name_first(&analysis).await? {
            Some(results) => (SearchStrategy::NameFirst, results),
            None => (SearchStrategy::SemanticOnly, self.semantic_only(&analysis).await?),
        };

        let mut passed: Vec<LecturerSearchResult> = candidates
            .into_iter()
            .filter(|r| r.final_score >= threshold)
            .collect();
        let total_candidates = passed.len();

        let rerank_active = options.rerank && self.reranker.is_some();
        let pool_size = if rerank_active {
            options.limit.max(self.config.rerank_candidates)
        } else {
            options.limit
        };
        let pool = if options.diversify {
            select_diverse(passed, pool_size, self.config.mmr_lambda)
        } else {
            passed.sort_by(|a, b| {
                b.final_score
                    .partial_cmp(&a.final_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.lecturer_id.cmp(&b.lecturer_id))
            });
            passed.truncate(pool_size);
            passed
        };

        let (mut results, reranked) = match (&self.reranker, rerank_active) {
            (Some(reranker), true) => reranker.rerank(query, pool).await,
            _ => (pass_through(pool), false),
        };
        results.truncate(options.limit);

        info!(
            "Search '{}': strategy={}, threshold={:.2}, {} passed, {} returned, reranked={}",
            crate::safe_truncate(query, 50),
            strategy,
            threshold,
            total_candidates,
            results.len(),
            reranked
        );

        let response = SearchResponse {
            query: query.to_string(),
            strategy,
            analysis,
            threshold,
            total_candidates,
            results,
            reranked,
            cached: false,
        };
        if options.use_cache {
            self.cache.insert(cache_key, response.clone());
        }
        Ok(response)
    }

    /// `None` when the query names nobody or no lecturer matches the names.
    async fn name_first(&self, analysis: &QueryAnalysis) -> Result<Option<Vec<LecturerSearchResult>>> {
        if !analysis.has_name() {
            return Ok(None);
        }

        let matchers: Vec<NameMatcher> = analysis.person_names.iter().map(|n| NameMatcher::new(n)).collect();
        let lecturers = self.profiles.list_profiles(ProfileType::Lecturer).await?;

        let mut matched: Vec<LecturerSearchResult> = Vec::new();
        for lecturer in &lecturers {
            let best = matchers
                .iter()
                .filter_map(|m| m.score(&lecturer.full_name))
                .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            if let Some((score, match_type)) = best {
                let mut result = base_result(lecturer, match_type);
                result.name_match_score = score;
                result.final_score = score;
                matched.push(result);
            }
        }

        if matched.is_empty() {
            debug!("No lecturer matches {:?}, falling back to semantic search", analysis.person_names);
            return Ok(None);
        }
        if analysis.topic_text.trim().is_empty() {
            return Ok(Some(matched));
        }

        let vector = match self.embedder.embed(&analysis.topic_text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Topic embedding failed, ranking by name only: {}", e);
                return Ok(Some(matched));
            }
        };

        let ids: Vec<String> = matched.iter().map(|r| r.lecturer_id.clone()).collect();
        let hits = self
            .vectors
            .query(VectorQuery {
                vector,
                top_k: self.config.vector_top_k.max(ids.len()),
                filter: Some(MetadataFilter::any_of(META_LECTURER_ID, ids)),
            })
            .await?;
        let mut chunks = best_chunk_per_lecturer(hits);
        let max_score = chunks.values().map(|(s, _)| *s).fold(0.0, f64::max);
        if max_score <= 0.0 {
            warn!("No knowledge chunks for name-matched lecturers, ranking by name only");
            return Ok(Some(matched));
        }

        for result in &mut matched {
            if let Some((score, text)) = chunks.remove(&result.lecturer_id) {
                result.semantic_score = score / max_score;
                result.matched_chunk = Some(text);
            }
            result.final_score = result.name_match_score * self.config.name_weight
                + result.semantic_score * self.config.semantic_weight;
        }
        Ok(Some(matched))
    }

    async fn semantic_only(&self, analysis: &QueryAnalysis) -> Result<Vec<LecturerSearchResult>> {
        let vector = self.embedder.embed(analysis.semantic_text()).await?;
        let hits = self
            .vectors
            .query(VectorQuery {
                vector,
                top_k: self.config.vector_top_k,
                filter: Some(MetadataFilter::eq(META_KIND, KIND_LECTURER_CHUNK)),
            })
            .await?;
        let chunks = best_chunk_per_lecturer(hits);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let lecturers: HashMap<String, Profile> = self
            .profiles
            .list_profiles(ProfileType::Lecturer)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        Ok(chunks
            .into_iter()
            .filter_map(|(lecturer_id, (score, text))| {
                let Some(profile) = lecturers.get(&lecturer_id) else {
                    debug!("Skipping chunk of unknown lecturer {}", lecturer_id);
                    return None;
                };
                let mut result = base_result(profile, MatchType::Semantic);
                result.semantic_score = score;
                result.final_score = score;
                result.matched_chunk = Some(text);
                Some(result)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::db::memory::InMemoryStore;
    use crate::db::store::VectorRecord;
    use crate::testing::{sample_index, sample_profiles, HashEmbedder, ScriptedLlm};
    use crate::toolkit::search::knowledge::KnowledgeIndexer;

    fn store_with_profiles(profiles: Vec<Profile>) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for profile in profiles {
            store.insert_profile(profile);
        }
        store
    }

    fn searcher_over(
        store: Arc<InMemoryStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> HybridSearcher {
        HybridSearcher::new(
            store.clone(),
            store,
            embedder,
            Arc::new(ConceptIndexService::with_index(sample_index())),
            llm,
            SearchConfig::default(),
        )
    }

    async fn searcher_with(llm: Option<Arc<dyn LlmProvider>>) -> HybridSearcher {
        let store = store_with_profiles(sample_profiles());
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::new(256));
        KnowledgeIndexer::new(embedder.clone(), store.clone())
            .index_all(store.as_ref())
            .await
            .unwrap();
        searcher_over(store, embedder, llm)
    }

    fn chunk(lecturer_id: &str, text: &str, embedder: &HashEmbedder) -> VectorRecord {
        VectorRecord {
            id: format!("{}:research_interests:0", lecturer_id),
            text: text.to_string(),
            vector: embedder.vector_for(text),
            metadata: BTreeMap::from([
                (META_KIND.to_string(), KIND_LECTURER_CHUNK.to_string()),
                (META_LECTURER_ID.to_string(), lecturer_id.to_string()),
            ]),
        }
    }

    fn ids(response: &SearchResponse) -> Vec<&str> {
        response.results.iter().map(|r| r.result.lecturer_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_name_query_uses_name_first() {
        let searcher = searcher_with(None).await;
        let response = searcher
            .search("Nguyễn Văn A machine learning", SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.strategy, SearchStrategy::NameFirst);
        assert_eq!(response.threshold, 0.60);
        assert_eq!(ids(&response), vec!["l1"]);
        let top = &response.results[0].result;
        assert_eq!(top.match_type, MatchType::ExactName);
        assert!((top.final_score - 1.0).abs() < 1e-6);
        assert!(!response.reranked);
    }

    #[tokio::test]
    async fn test_pure_name_query_scores_by_name() {
        let searcher = searcher_with(None).await;
        let response = searcher.search("Trần Thị Bình", SearchOptions::default()).await.unwrap();
        assert_eq!(response.strategy, SearchStrategy::NameFirst);
        assert_eq!(ids(&response), vec!["l2"]);
        assert_eq!(response.results[0].result.semantic_score, 0.0);
        assert_eq!(response.results[0].result.final_score, 1.0);
    }

    #[tokio::test]
    async fn test_name_query_without_knowledge_keeps_name_score() {
        let store = store_with_profiles(sample_profiles());
        let searcher = searcher_over(store, Arc::new(HashEmbedder::new(256)), None);

        let response = searcher
            .search("Nguyễn Văn A machine learning", SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(response.strategy, SearchStrategy::NameFirst);
        assert_eq!(ids(&response), vec!["l1"]);
        let top = &response.results[0].result;
        assert_eq!(top.semantic_score, 0.0);
        assert_eq!(top.final_score, 1.0);
        assert!(top.matched_chunk.is_none());
    }

    #[tokio::test]
    async fn test_name_first_fuses_fuzzy_name_with_normalized_semantic() {
        let store = store_with_profiles(vec![
            Profile::new("l1", ProfileType::Lecturer, "Nguyễn Văn An"),
            Profile::new("l2", ProfileType::Lecturer, "Nguyễn Văn An Khang"),
            Profile::new("l3", ProfileType::Lecturer, "Trần Thị Bình"),
        ]);
        let embedder = HashEmbedder::new(256);
        let exact_chunk = chunk("l1", "machine learning systems", &embedder);
        let fuzzy_chunk = chunk("l2", "machine learning", &embedder);
        let topic = embedder.vector_for("machine learning");
        let exact_cosine: f64 = topic
            .iter()
            .zip(&exact_chunk.vector)
            .map(|(a, b)| f64::from(*a) * f64::from(*b))
            .sum();
        store.upsert(vec![exact_chunk, fuzzy_chunk]).await.unwrap();

        let searcher = searcher_over(store, Arc::new(embedder), None);
        let mut options = SearchOptions::default();
        options.diversify = false;
        let response = searcher.search("Nguyễn Văn An machine learning", options).await.unwrap();
        assert_eq!(response.strategy, SearchStrategy::NameFirst);

        let by_id: HashMap<&str, &LecturerSearchResult> = response
            .results
            .iter()
            .map(|r| (r.result.lecturer_id.as_str(), &r.result))
            .collect();
        assert_eq!(by_id.len(), 2);

        // l2 holds the best chunk, so its semantic score normalizes to 1.0
        let fuzzy = by_id["l2"];
        assert_eq!(fuzzy.match_type, MatchType::FuzzyName);
        assert!((fuzzy.name_match_score - 0.7).abs() < 1e-9);
        assert!((fuzzy.semantic_score - 1.0).abs() < 1e-6);
        assert!((fuzzy.final_score - (0.7 * 0.4 + 0.6)).abs() < 1e-6);

        let exact = by_id["l1"];
        assert_eq!(exact.match_type, MatchType::ExactName);
        assert!(exact.semantic_score < 1.0);
        assert!((exact.semantic_score - exact_cosine).abs() < 1e-5);
        assert!((exact.final_score - (0.4 + exact_cosine * 0.6)).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_topic_query_is_semantic_only() {
        let searcher = searcher_with(None).await;
        let response = searcher
            .search("natural language processing", SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.strategy, SearchStrategy::SemanticOnly);
        assert_eq!(response.results[0].result.lecturer_id, "l2");
        assert!(response
            .results
            .iter()
            .all(|r| r.result.final_score >= response.threshold));
    }

    #[tokio::test]
    async fn test_unknown_name_falls_back_to_semantic() {
        let searcher = searcher_with(None).await;
        let response = searcher
            .search("Võ Thanh Tùng natural language processing", SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(response.analysis.person_names, vec!["Võ Thanh Tùng".to_string()]);
        assert_eq!(response.strategy, SearchStrategy::SemanticOnly);
        assert_eq!(response.results[0].result.lecturer_id, "l2");
    }

    #[tokio::test]
    async fn test_second_search_is_cached() {
        let searcher = searcher_with(None).await;
        let first = searcher.search("machine learning", SearchOptions::default()).await.unwrap();
        let second = searcher.search("machine learning", SearchOptions::default()).await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.results, second.results);
        assert_eq!(searcher.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_rerank_failure_keeps_hybrid_order() {
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm::failing());
        let searcher = searcher_with(Some(llm)).await;
        let response = searcher
            .search("natural language processing", SearchOptions::default())
            .await
            .unwrap();
        assert!(!response.reranked);
        assert!(!response.analysis.llm_refined);
        assert!(response.results[0].rerank_reason.starts_with("Ranked by hybrid score"));
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let searcher = searcher_with(None).await;
        let err = searcher.search("  ", SearchOptions::default().with_limit(0)).await.unwrap_err();
        match err {
            OntomatchError::Validation(issues) => assert_eq!(issues.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
