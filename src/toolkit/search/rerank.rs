use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::models::{LecturerSearchResult, RerankedResult};
use crate::llm::json::extract_json;
use crate::llm::providers::base::LlmProvider;

pub const DEFAULT_RERANK_CANDIDATES: usize = 20;
pub const DEFAULT_RERANK_MIN_SCORE: f64 = 0.80;

const SNIPPET_CHARS: usize = 200;


pub const SYSTEM_PROMPT: &str = r#"You are a research supervision expert. Judge how relevant each lecturer is to a student's search query.

Score every candidate from 0.0 (irrelevant) to 1.0 (perfect fit) and give a one-sentence reason grounded in the candidate's research.

Always respond with valid JSON."#;


pub fn build_rerank_prompt(query: &str, candidates: &[LecturerSearchResult]) -> String {
    let listing = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "  [{}] {}\n      Research interests: {}\n      Areas: {}\n      Evidence: {}\n",
                i,
                c.full_name,
                c.research_interests.join(", "),
                c.area_of_interest.join(", "),
                c.matched_chunk
                    .as_deref()
                    .map(|t| crate::safe_truncate_ellipsis(t, SNIPPET_CHARS))
                    .unwrap_or_else(|| "(none)".to_string())
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"**Query:** "{query}"

**Candidates:**
{listing}

Respond with JSON:
{{"rankings": [{{"index": 0, "score": 0.92, "reason": "..."}}]}}
Include every candidate index exactly once."#
    )
}

#[derive(Debug, Deserialize)]
struct RerankItem {
    index: usize,
    score: f64,
    #[serde(default)]
    reason: String,
}

/// Accepts `{"rankings": [...]}`, `{"results": [...]}` or a bare array. `None` when no
/// item parses.
fn parse_rankings(response: &str) -> Option<Vec<RerankItem>> {
    let value = extract_json(response)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("rankings").or_else(|| map.remove("results")) {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };
    let parsed: Vec<RerankItem> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    (!parsed.is_empty()).then_some(parsed)
}

/// Reason used whenever the reranker did not score a result.
pub fn fallback_reason(result: &LecturerSearchResult) -> String {
    format!(
        "Ranked by hybrid score {:.2} ({})",
        result.final_score,
        result.match_type.describe()
    )
}

/// Keeps the incoming order with deterministic reasons.
pub fn pass_through(candidates: Vec<LecturerSearchResult>) -> Vec<RerankedResult> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, result)| RerankedResult {
            rerank_reason: fallback_reason(&result),
            result,
            rerank_score: None,
            original_rank: i + 1,
            final_rank: i + 1,
        })
        .collect()
}


pub struct LlmReranker {
    llm: Arc<dyn LlmProvider>,
    max_candidates: usize,
    min_score: f64,
}

impl LlmReranker {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        info!("LlmReranker initialized: provider={}", llm.provider_name());
        Self {
            llm,
            max_candidates: DEFAULT_RERANK_CANDIDATES,
            min_score: DEFAULT_RERANK_MIN_SCORE,
        }
    }

    pub fn with_limits(mut self, max_candidates: usize, min_score: f64) -> Self {
        self.max_candidates = max_candidates.max(1);
        self.min_score = min_score;
        self
    }

    /// Scores the leading candidates with the LLM, drops those under the quality bar and
    /// sorts the rest by that score. The flag is false when the provider failed or
    /// answered with nothing usable; the input order is kept in that case.
    pub async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<LecturerSearchResult>,
    ) -> (Vec<RerankedResult>, bool) {
        if candidates.is_empty() {
            return (Vec::new(), false);
        }
        candidates.truncate(self.max_candidates);

        let prompt = build_rerank_prompt(query, &candidates);
        debug!("Reranking {} candidates", candidates.len());

        let items = match self.llm.generate(SYSTEM_PROMPT, &prompt, Some("json_object")).await {
            Ok((response, _)) => match parse_rankings(&response) {
                Some(items) => items,
                None => {
                    warn!(
                        "Malformed rerank response, keeping hybrid order: {}",
                        crate::safe_truncate(&response, 200)
                    );
                    return (pass_through(candidates), false);
                }
            },
            Err(e) => {
                warn!("Rerank call failed, keeping hybrid order: {}", e);
                return (pass_through(candidates), false);
            }
        };

        let mut seen = HashSet::new();
        let mut scored: Vec<(usize, f64, String)> = items
            .into_iter()
            .filter(|item| item.index < candidates.len() && seen.insert(item.index))
            .filter(|item| item.score.is_finite() && item.score >= self.min_score)
            .map(|item| (item.index, item.score.min(1.0), item.reason))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut slots: Vec<Option<LecturerSearchResult>> = candidates.into_iter().map(Some).collect();
        let reranked: Vec<RerankedResult> = scored
            .into_iter()
            .filter_map(|(idx, score, reason)| {
                let result = slots[idx].take()?;
                let rerank_reason = if reason.trim().is_empty() {
                    fallback_reason(&result)
                } else {
                    reason.trim().to_string()
                };
                Some((idx, score, rerank_reason, result))
            })
            .enumerate()
            .map(|(rank, (idx, score, rerank_reason, result))| RerankedResult {
                result,
                rerank_score: Some(score),
                rerank_reason,
                original_rank: idx + 1,
                final_rank: rank + 1,
            })
            .collect();

        info!(
            "Reranked: {} of {} candidates kept (min score {:.2})",
            reranked.len(),
            slots.len(),
            self.min_score
        );
        (reranked, true)
    }
}
