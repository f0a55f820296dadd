use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::scoring::depth_weight;
use crate::core::config::MatchingConfig;
use crate::toolkit::ontology::models::domain_key;
use crate::toolkit::ontology::ExtractedConcept;


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOptions {
    pub min_depth: usize,
    pub min_score: f64,
    pub enable_parent_boost: bool,
    pub parent_boost: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self::from(&MatchingConfig::default())
    }
}

impl From<&MatchingConfig> for MatchOptions {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            min_depth: config.min_depth,
            min_score: config.min_score,
            enable_parent_boost: config.enable_parent_boost,
            parent_boost: config.parent_boost,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedConcept {
    pub key: String,
    pub label: String,
    pub depth: usize,
    pub weight: f64,
    pub student_sources: BTreeSet<String>,
    pub lecturer_sources: BTreeSet<String>,
}

/// Two different concepts under the same domain, one per side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedPair {
    pub student_key: String,
    pub lecturer_key: String,
    pub domain: String,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score: f64,
    pub core_score: f64,
    pub boost_score: f64,
    pub matched_concepts: Vec<MatchedConcept>,
    pub concept_count: usize,
    pub boosted_pairs: Vec<BoostedPair>,
}

/// Keeps concepts at `min_depth` or deeper, first occurrence per key, sources merged.
fn specific_concepts(concepts: &[ExtractedConcept], min_depth: usize) -> Vec<ExtractedConcept> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut kept: Vec<ExtractedConcept> = Vec::new();
    for concept in concepts.iter().filter(|c| c.depth >= min_depth) {
        match positions.get(concept.key.as_str()) {
            Some(&pos) => kept[pos].sources.extend(concept.sources.iter().cloned()),
            None => {
                positions.insert(concept.key.as_str(), kept.len());
                kept.push(concept.clone());
            }
        }
    }
    kept
}

/// Scores a student's concepts against a lecturer's.
///
/// Every shared key adds its depth weight to the core score. When at least one key is
/// shared, each pair of different keys under the same domain adds `parent_boost`. Returns
/// `None` when either side has no concept deep enough or the total is below `min_score`.
pub fn match_concepts(
    student: &[ExtractedConcept],
    lecturer: &[ExtractedConcept],
    options: &MatchOptions,
) -> Option<MatchResult> {
    let student = specific_concepts(student, options.min_depth);
    let lecturer = specific_concepts(lecturer, options.min_depth);
    if student.is_empty() || lecturer.is_empty() {
        return None;
    }

    let lecturer_by_key: HashMap<&str, &ExtractedConcept> =
        lecturer.iter().map(|c| (c.key.as_str(), c)).collect();

    let mut core_score = 0.0;
    let mut matched_concepts = Vec::new();
    for concept in &student {
        let Some(other) = lecturer_by_key.get(concept.key.as_str()) else {
            continue;
        };
        let weight = depth_weight(concept.depth);
        core_score += weight;
        matched_concepts.push(MatchedConcept {
            key: concept.key.clone(),
            label: concept.label.clone(),
            depth: concept.depth,
            weight,
            student_sources: concept.sources.clone(),
            lecturer_sources: other.sources.clone(),
        });
    }

    let mut boost_score = 0.0;
    let mut boosted_pairs = Vec::new();
    if options.enable_parent_boost && core_score > 0.0 {
        for s in &student {
            let Some(domain) = domain_key(&s.key) else {
                continue;
            };
            for l in &lecturer {
                if s.key != l.key && domain_key(&l.key) == Some(domain) {
                    boost_score += options.parent_boost;
                    boosted_pairs.push(BoostedPair {
                        student_key: s.key.clone(),
                        lecturer_key: l.key.clone(),
                        domain: domain.to_string(),
                    });
                }
            }
        }
    }

    let score = core_score + boost_score;
    if score < options.min_score {
        debug!(
            "Match rejected: score {:.2} below {:.2} (core={:.2}, boost={:.2})",
            score, options.min_score, core_score, boost_score
        );
        return None;
    }

    Some(MatchResult {
        score,
        core_score,
        boost_score,
        concept_count: matched_concepts.len(),
        matched_concepts,
        boosted_pairs,
    })
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMatch {
    pub profile_id: String,
    pub full_name: String,
    pub result: MatchResult,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankOptions {
    pub top_n: usize,
    pub min_score: f64,
    pub min_concept_count: usize,
}

impl From<&MatchingConfig> for RankOptions {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            top_n: config.top_n,
            min_score: config.min_score,
            min_concept_count: config.min_concept_count,
        }
    }
}

/// Drops matches under the score or concept-count floor, then keeps the `top_n` best.
pub fn rank_matches(matches: Vec<ProfileMatch>, options: &RankOptions) -> Vec<ProfileMatch> {
    let mut ranked: Vec<ProfileMatch> = matches
        .into_iter()
        .filter(|m| {
            m.result.score >= options.min_score && m.result.concept_count >= options.min_concept_count
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.result
            .score
            .partial_cmp(&a.result.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.profile_id.cmp(&b.profile_id))
    });
    ranked.truncate(options.top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(key: &str, source: &str) -> ExtractedConcept {
        ExtractedConcept {
            key: key.to_string(),
            label: key.rsplit('.').next().unwrap_or(key).to_string(),
            depth: key.split('.').count(),
            parent: key.rfind('.').map(|i| key[..i].to_string()),
            sources: BTreeSet::from([source.to_string()]),
            matched_token: key.to_string(),
        }
    }

    #[test]
    fn test_shared_leaf_scenario() {
        let student = vec![
            concept("it.ai.machine_learning", "skills"),
            concept("it.ai.nlp", "interests"),
        ];
        let lecturer = vec![concept("it.ai.machine_learning", "research_interests")];

        let result = match_concepts(&student, &lecturer, &MatchOptions::default()).unwrap();
        assert_eq!(result.core_score, 1.0);
        assert_eq!(result.concept_count, 1);
        assert!(result.score >= 1.0);
        assert!((result.boost_score - 0.3).abs() < 1e-9);
        assert_eq!(result.boosted_pairs[0].student_key, "it.ai.nlp");
        assert_eq!(
            result.matched_concepts[0].lecturer_sources,
            BTreeSet::from(["research_interests".to_string()])
        );
    }

    #[test]
    fn test_no_boost_without_anchor() {
        let student = vec![concept("it.ai.nlp", "skills")];
        let lecturer = vec![concept("it.ai.computer_vision", "area_of_interest")];
        let options = MatchOptions {
            min_score: 0.0,
            ..MatchOptions::default()
        };
        let result = match_concepts(&student, &lecturer, &options).unwrap();
        assert_eq!(result.core_score, 0.0);
        assert_eq!(result.boost_score, 0.0);
        assert!(result.boosted_pairs.is_empty());
    }

    #[test]
    fn test_rejects_below_min_score() {
        let student = vec![concept("it.ai.nlp", "skills")];
        let lecturer = vec![concept("it.data.databases", "area_of_interest")];
        assert!(match_concepts(&student, &lecturer, &MatchOptions::default()).is_none());
    }

    #[test]
    fn test_depth_filter_can_empty_a_side() {
        let student = vec![concept("it.ai", "skills")];
        let lecturer = vec![concept("it.ai", "area_of_interest")];
        assert!(match_concepts(&student, &lecturer, &MatchOptions::default()).is_none());
    }

    #[test]
    fn test_deeper_matches_weigh_more_and_boost_can_be_disabled() {
        let student = vec![
            concept("it.ai.machine_learning.deep_learning", "skills"),
            concept("it.ai.nlp", "skills"),
        ];
        let lecturer = vec![
            concept("it.ai.machine_learning.deep_learning", "research_interests"),
            concept("it.ai.computer_vision", "research_interests"),
        ];
        let options = MatchOptions {
            enable_parent_boost: false,
            ..MatchOptions::default()
        };
        let result = match_concepts(&student, &lecturer, &options).unwrap();
        assert_eq!(result.core_score, 1.5);
        assert_eq!(result.boost_score, 0.0);

        let boosted = match_concepts(&student, &lecturer, &MatchOptions::default()).unwrap();
        // deep_learning~computer_vision, nlp~deep_learning, nlp~computer_vision
        assert_eq!(boosted.boosted_pairs.len(), 3);
        assert!((boosted.score - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_rank_matches() {
        let make = |id: &str, score: f64, count: usize| ProfileMatch {
            profile_id: id.to_string(),
            full_name: id.to_string(),
            result: MatchResult {
                score,
                core_score: score,
                boost_score: 0.0,
                matched_concepts: vec![],
                concept_count: count,
                boosted_pairs: vec![],
            },
        };
        let ranked = rank_matches(
            vec![make("a", 1.0, 1), make("b", 3.0, 2), make("c", 0.5, 1), make("d", 2.0, 0), make("e", 2.5, 1)],
            &RankOptions {
                top_n: 2,
                min_score: 1.0,
                min_concept_count: 1,
            },
        );
        assert_eq!(ranked.iter().map(|m| m.profile_id.as_str()).collect::<Vec<_>>(), vec!["b", "e"]);
    }
}
