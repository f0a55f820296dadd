use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::models::{CandidateExample, ConceptCandidate, UnmatchedRecord};
use super::suggest::{suggest_aliases, suggest_parent, title_case};
use crate::core::config::EvolutionConfig;
use crate::core::error::Result;
use crate::db::CandidateStore;
use crate::toolkit::text::{is_stopword, normalize};

/// Largest length difference and edit distance for two tokens to be variants.
pub const MAX_VARIANT_DISTANCE: usize = 2;


#[derive(Debug, Clone)]
pub struct DetectionOptions {
    pub min_token_length: usize,
    pub max_examples: usize,
    pub default_parent: String,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self::from(&EvolutionConfig::default())
    }
}

impl From<&EvolutionConfig> for DetectionOptions {
    fn from(config: &EvolutionConfig) -> Self {
        Self {
            min_token_length: config.min_token_length,
            max_examples: config.max_examples,
            default_parent: config.default_parent.clone(),
        }
    }
}

/// Whether an unmatched token is worth tracking.
pub fn is_candidate_token(token: &str, min_length: usize) -> bool {
    token.chars().count() >= min_length
        && !is_stopword(token)
        && !token.chars().all(|c| c.is_ascii_digit() || c.is_whitespace())
}

/// Containment either way, or close spelling.
pub fn tokens_similar(a: &str, b: &str) -> bool {
    if a.contains(b) || b.contains(a) {
        return true;
    }
    let (len_a, len_b) = (a.chars().count(), b.chars().count());
    len_a.abs_diff(len_b) <= MAX_VARIANT_DISTANCE && strsim::levenshtein(a, b) <= MAX_VARIANT_DISTANCE
}


/// Tokens grouped under the first member seen.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenCluster {
    pub canonical: String,
    pub variants: Vec<String>,
    pub occurrences: Vec<CandidateExample>,
}

impl TokenCluster {
    fn new(token: String, occurrence: CandidateExample) -> Self {
        Self {
            canonical: token.clone(),
            variants: vec![token],
            occurrences: vec![occurrence],
        }
    }
}

/// Filters and normalizes every token of the batch, then clusters greedily: each token
/// joins the first cluster whose canonical it resembles, else starts a new one.
pub fn cluster_tokens(batch: &[UnmatchedRecord], min_length: usize) -> Vec<TokenCluster> {
    let mut clusters: Vec<TokenCluster> = Vec::new();

    for record in batch {
        for raw in &record.unmatched_tokens {
            let token = normalize(raw);
            if !is_candidate_token(&token, min_length) {
                continue;
            }
            let occurrence = CandidateExample {
                profile_id: record.profile_id.clone(),
                profile_type: record.profile_type,
                source_field: record.source_field.clone(),
                token: token.clone(),
            };

            match clusters.iter_mut().find(|c| tokens_similar(&c.canonical, &token)) {
                Some(cluster) => {
                    if !cluster.variants.contains(&token) {
                        cluster.variants.push(token);
                    }
                    cluster.occurrences.push(occurrence);
                }
                None => clusters.push(TokenCluster::new(token, occurrence)),
            }
        }
    }

    clusters
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub records: usize,
    pub occurrences: usize,
    pub clusters: usize,
    pub created: Vec<String>,
    pub updated: Vec<String>,
}


pub struct CandidateDetector {
    store: Arc<dyn CandidateStore>,
    options: DetectionOptions,
}

impl CandidateDetector {
    pub fn new(store: Arc<dyn CandidateStore>, options: DetectionOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &DetectionOptions {
        &self.options
    }

    /// Clusters the batch and folds each cluster into the candidate with the same
    /// canonical token, whatever its status, or into a new pending candidate.
    pub async fn detect(&self, batch: &[UnmatchedRecord]) -> Result<DetectionReport> {
        let clusters = cluster_tokens(batch, self.options.min_token_length);
        let mut report = DetectionReport {
            records: batch.len(),
            occurrences: clusters.iter().map(|c| c.occurrences.len()).sum(),
            clusters: clusters.len(),
            ..DetectionReport::default()
        };

        for cluster in clusters {
            let occurrences = cluster.occurrences.len() as u64;
            let (mut candidate, created) = match self.store.find_by_canonical(&cluster.canonical).await? {
                Some(mut existing) => {
                    existing.frequency += occurrences;
                    existing.updated_at = Utc::now();
                    (existing, false)
                }
                None => {
                    let mut candidate = ConceptCandidate::new(cluster.canonical.clone(), occurrences);
                    candidate.suggested_parent =
                        suggest_parent(&cluster.canonical, &self.options.default_parent);
                    candidate.suggested_label = title_case(&cluster.canonical);
                    (candidate, true)
                }
            };

            for variant in &cluster.variants {
                candidate.add_variant(variant);
            }
            if candidate.is_pending() {
                candidate.suggested_aliases = suggest_aliases(&candidate.canonical, &candidate.variants);
            }
            for example in cluster.occurrences {
                candidate.add_example(example, self.options.max_examples);
            }

            debug!(
                "Candidate '{}' frequency={} variants={} ({})",
                candidate.canonical,
                candidate.frequency,
                candidate.variants.len(),
                if created { "new" } else { "merged" }
            );
            if created {
                report.created.push(candidate.canonical.clone());
            } else {
                report.updated.push(candidate.canonical.clone());
            }
            self.store.save_candidate(candidate).await?;
        }

        info!(
            "Detection finished: {} records, {} occurrences, {} new, {} updated",
            report.records,
            report.occurrences,
            report.created.len(),
            report.updated.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::toolkit::evolution::models::CandidateStatus;
    use crate::toolkit::profile::ProfileType;

    fn record(profile: &str, tokens: &[&str]) -> UnmatchedRecord {
        UnmatchedRecord {
            profile_id: profile.to_string(),
            profile_type: ProfileType::Student,
            source_field: "skills".to_string(),
            unmatched_tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_token_filter() {
        assert!(is_candidate_token("blockchain", 3));
        assert!(!is_candidate_token("ab", 3));
        assert!(!is_candidate_token("2024", 3));
        assert!(!is_candidate_token("with", 3));
    }

    #[test]
    fn test_similarity() {
        assert!(tokens_similar("blockchain", "blockchains"));
        assert!(tokens_similar("rust", "rusty"));
        assert!(tokens_similar("kotlin", "kotlim"));
        assert!(!tokens_similar("kotlin", "golang"));
    }

    #[test]
    fn test_clusters_keep_first_seen_canonical() {
        let batch = vec![
            record("s1", &["Blockchain", "flutter"]),
            record("s2", &["blockchains", "2024", "Flutter"]),
        ];
        let clusters = cluster_tokens(&batch, 3);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].canonical, "blockchain");
        assert_eq!(clusters[0].variants, vec!["blockchain", "blockchains"]);
        assert_eq!(clusters[1].occurrences.len(), 2);
    }

    #[tokio::test]
    async fn test_detect_creates_pending_candidates() {
        let store = Arc::new(InMemoryStore::new());
        let detector = CandidateDetector::new(store.clone(), DetectionOptions::default());
        let report = detector
            .detect(&[record("s1", &["blockchain", "federated learning"])])
            .await
            .unwrap();
        assert_eq!(report.created, vec!["blockchain", "federated learning"]);

        let candidate = store.find_by_canonical("federated learning").await.unwrap().unwrap();
        assert_eq!(candidate.status, CandidateStatus::Pending);
        assert_eq!(candidate.frequency, 1);
        assert_eq!(candidate.suggested_parent, "it.ai");
        assert_eq!(candidate.suggested_label, "Federated Learning");
    }

    #[tokio::test]
    async fn test_rerun_increments_frequency_without_duplicate_examples() {
        let store = Arc::new(InMemoryStore::new());
        let detector = CandidateDetector::new(store.clone(), DetectionOptions::default());
        let batch = vec![
            record("s1", &["blockchain"]),
            record("s2", &["blockchain", "blockchains"]),
        ];

        detector.detect(&batch).await.unwrap();
        let first = store.find_by_canonical("blockchain").await.unwrap().unwrap();
        assert_eq!(first.frequency, 3);
        assert_eq!(first.examples.len(), 3);

        let report = detector.detect(&batch).await.unwrap();
        assert_eq!(report.updated, vec!["blockchain"]);
        let second = store.find_by_canonical("blockchain").await.unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.frequency, 6);
        assert_eq!(second.examples.len(), 3);
        assert_eq!(second.suggested_aliases, vec!["blockchains"]);
    }
}
