pub mod diversity;
pub mod hybrid;
pub mod knowledge;
pub mod models;
pub mod names;
pub mod query_processor;
pub mod rerank;
pub mod threshold;

pub use diversity::{profile_similarity, select_diverse};
pub use hybrid::HybridSearcher;
pub use knowledge::{KnowledgeChunk, KnowledgeIndexer, KnowledgeSyncReport};
pub use models::{
    LecturerSearchResult, MatchType, QueryAnalysis, QueryIntent, RerankedResult, SearchOptions,
    SearchResponse, SearchStrategy,
};
pub use names::{extract_person_names, NameMatcher};
pub use query_processor::QueryProcessor;
pub use rerank::LlmReranker;
pub use threshold::score_threshold;
