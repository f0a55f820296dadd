use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::core::config::SearchConfig;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchType {
    ExactName,
    FuzzyName,
    Semantic,
}

impl MatchType {
    pub fn describe(self) -> &'static str {
        match self {
            Self::ExactName => "exact name match",
            Self::FuzzyName => "partial name match",
            Self::Semantic => "semantic match",
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchStrategy {
    NameFirst,
    SemanticOnly,
}


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum QueryIntent {
    /// Looking for a specific lecturer by name.
    FindLecturer,
    /// Looking for lecturers working on a topic.
    TopicSearch,
    #[default]
    General,
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub query: String,
    pub person_names: Vec<String>,
    /// Query with person names and honorifics removed.
    pub topic_text: String,
    pub concept_keys: Vec<String>,
    pub intent: QueryIntent,
    #[serde(default)]
    pub llm_refined: bool,
}

impl QueryAnalysis {
    pub fn has_name(&self) -> bool {
        !self.person_names.is_empty()
    }

    /// Text embedded for semantic search.
    pub fn semantic_text(&self) -> &str {
        if self.topic_text.trim().is_empty() {
            &self.query
        } else {
            &self.topic_text
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LecturerSearchResult {
    pub lecturer_id: String,
    pub full_name: String,
    pub name_match_score: f64,
    pub semantic_score: f64,
    pub final_score: f64,
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_chunk: Option<String>,
    #[serde(default)]
    pub research_interests: Vec<String>,
    #[serde(default)]
    pub area_of_interest: Vec<String>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedResult {
    #[serde(flatten)]
    pub result: LecturerSearchResult,
    /// Present only when the reranker scored this result.
    pub rerank_score: Option<f64>,
    pub rerank_reason: String,
    /// 1-based position before reranking.
    pub original_rank: usize,
    pub final_rank: usize,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub limit: usize,
    pub rerank: bool,
    pub diversify: bool,
    pub use_cache: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            limit: config.default_limit,
            rerank: config.rerank_enabled,
            diversify: true,
            use_cache: true,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub strategy: SearchStrategy,
    pub analysis: QueryAnalysis,
    pub threshold: f64,
    /// Results that passed the threshold, before diversity and reranking.
    pub total_candidates: usize,
    pub results: Vec<RerankedResult>,
    pub reranked: bool,
    #[serde(default)]
    pub cached: bool,
}
