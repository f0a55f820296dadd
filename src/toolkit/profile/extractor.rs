use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{OntologyExtract, Profile, ProfileFieldConfig};
use crate::core::error::{OntomatchError, Result};
use crate::toolkit::ontology::{ConceptHit, ConceptIndex, ExtractedConcept};
use crate::toolkit::similarity::mean_pool;
use crate::toolkit::text::{expand_abbreviations, index_words, is_stopword, split_phrases};


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOptions {
    /// Concepts shallower than this are dropped (root and domain level by default).
    pub min_depth: usize,
    pub expand_abbreviations: bool,
    pub fields: ProfileFieldConfig,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            min_depth: 3,
            expand_abbreviations: true,
            fields: ProfileFieldConfig::default(),
        }
    }
}


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub concepts: Vec<ExtractedConcept>,
    pub unmatched_tokens: Vec<String>,
    pub unmatched_by_field: BTreeMap<String, Vec<String>>,
    pub used_trie: bool,
}

impl ExtractionResult {
    pub fn concept_keys(&self) -> Vec<&str> {
        self.concepts.iter().map(|c| c.key.as_str()).collect()
    }

    /// Snapshot for the profile, with the mean of the matched concepts' embeddings.
    pub fn to_extract(&self, index: &ConceptIndex) -> OntologyExtract {
        let embedding = mean_pool(
            self.concepts
                .iter()
                .filter_map(|c| index.concept(&c.key))
                .filter_map(|c| c.embedding.as_deref()),
        );
        OntologyExtract {
            concepts: self.concepts.clone(),
            embedding,
            extracted_at: Utc::now(),
        }
    }
}

/// Accumulates hits across all fields of one profile.
struct Collector<'a> {
    index: &'a ConceptIndex,
    min_depth: usize,
    concepts: Vec<ExtractedConcept>,
    positions: HashMap<String, usize>,
    unmatched: Vec<String>,
    unmatched_seen: HashSet<String>,
    by_field: BTreeMap<String, Vec<String>>,
}

impl<'a> Collector<'a> {
    fn new(index: &'a ConceptIndex, min_depth: usize) -> Self {
        Self {
            index,
            min_depth,
            concepts: Vec::new(),
            positions: HashMap::new(),
            unmatched: Vec::new(),
            unmatched_seen: HashSet::new(),
            by_field: BTreeMap::new(),
        }
    }

    /// Records every hit that passes the depth filter. Returns whether `hits` was
    /// non-empty: a concept dropped for being too broad still counts as a match.
    fn record(&mut self, hits: Vec<ConceptHit>, field: &str, token: &str) -> bool {
        let matched = !hits.is_empty();
        for hit in hits {
            let Some(concept) = self.index.concept(&hit.concept_key) else {
                continue;
            };
            if concept.depth() < self.min_depth {
                debug!("Dropping shallow concept {} for '{}'", concept.key, token);
                continue;
            }
            match self.positions.get(&concept.key) {
                Some(&pos) => {
                    self.concepts[pos].sources.insert(field.to_string());
                }
                None => {
                    self.positions.insert(concept.key.clone(), self.concepts.len());
                    self.concepts.push(ExtractedConcept::from_concept(concept, field, token));
                }
            }
        }
        matched
    }

    fn unmatched(&mut self, field: &str, token: &str) {
        if token.is_empty() || is_stopword(token) {
            return;
        }
        let per_field = self.by_field.entry(field.to_string()).or_default();
        if !per_field.iter().any(|t| t == token) {
            per_field.push(token.to_string());
        }
        if self.unmatched_seen.insert(token.to_string()) {
            self.unmatched.push(token.to_string());
        }
    }
}

fn surface_forms(token: &str, expand: bool) -> Vec<String> {
    let token = vec![token.to_string()];
    if expand {
        expand_abbreviations(&token)
    } else {
        token
    }
}

fn resolve_forms(index: &ConceptIndex, forms: &[String]) -> Vec<ConceptHit> {
    forms.iter().flat_map(|form| index.resolve(form)).collect()
}

/// Maps the configured text fields of `profile` onto the taxonomy.
///
/// Each phrase is resolved whole first. Only when the phrase finds nothing are its
/// individual words tried; words that still find nothing are reported as unmatched, or
/// the whole phrase is when none of its words matched either.
pub fn extract_concepts(
    profile: &Profile,
    index: &ConceptIndex,
    options: &ExtractionOptions,
) -> Result<ExtractionResult> {
    let fields = options.fields.fields_for(profile.profile_type);
    if !fields.iter().any(|field| profile.has_text(field)) {
        return Err(OntomatchError::EmptyProfile(profile.id.clone()));
    }

    let mut collector = Collector::new(index, options.min_depth);

    for field in fields {
        for value in profile.field(field) {
            for phrase in split_phrases(value) {
                let forms = surface_forms(&phrase, options.expand_abbreviations);
                let hits = resolve_forms(index, &forms);
                if collector.record(hits, field, &phrase) {
                    continue;
                }

                let words: Vec<&str> = index_words(&phrase).filter(|w| !is_stopword(w)).collect();
                if words.len() < 2 {
                    collector.unmatched(field, &phrase);
                    continue;
                }

                let mut missed = Vec::new();
                for word in &words {
                    let forms = surface_forms(word, options.expand_abbreviations);
                    let hits = resolve_forms(index, &forms);
                    if !collector.record(hits, field, word) {
                        missed.push(*word);
                    }
                }

                if missed.len() == words.len() {
                    collector.unmatched(field, &phrase);
                } else {
                    for word in missed {
                        collector.unmatched(field, word);
                    }
                }
            }
        }
    }

    debug!(
        "Extracted {} concepts ({} unmatched) from profile {}",
        collector.concepts.len(),
        collector.unmatched.len(),
        profile.id
    );

    Ok(ExtractionResult {
        concepts: collector.concepts,
        unmatched_tokens: collector.unmatched,
        unmatched_by_field: collector.by_field,
        used_trie: index.has_trie(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_index;
    use crate::toolkit::profile::ProfileType;

    fn student(skills: &[&str], interests: &[&str]) -> Profile {
        Profile::new("s1", ProfileType::Student, "Trần Thị B")
            .with_field("skills", skills.iter().copied())
            .with_field("interests", interests.iter().copied())
    }

    #[test]
    fn test_phrase_and_alias_matching() {
        let index = sample_index();
        let profile = student(&["Machine Learning, Python"], &["xử lý ngôn ngữ tự nhiên"]);
        let result = extract_concepts(&profile, &index, &ExtractionOptions::default()).unwrap();

        let keys = result.concept_keys();
        assert!(keys.contains(&"it.ai.machine_learning"));
        assert!(keys.contains(&"it.ai.nlp"));
        assert!(result.used_trie);
    }

    #[test]
    fn test_dedup_merges_sources() {
        let index = sample_index();
        let profile = student(&["ML"], &["machine learning"]);
        let result = extract_concepts(&profile, &index, &ExtractionOptions::default()).unwrap();

        let ml: Vec<_> = result
            .concepts
            .iter()
            .filter(|c| c.key == "it.ai.machine_learning")
            .collect();
        assert_eq!(ml.len(), 1);
        assert_eq!(
            ml[0].sources.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["interests", "skills"]
        );
    }

    #[test]
    fn test_depth_filter_drops_domains() {
        let index = sample_index();
        let profile = student(&["Artificial Intelligence"], &[]);
        let result = extract_concepts(&profile, &index, &ExtractionOptions::default()).unwrap();
        assert!(result.concepts.iter().all(|c| c.depth >= 3));
        assert!(result.unmatched_tokens.is_empty());

        let shallow = ExtractionOptions {
            min_depth: 1,
            ..Default::default()
        };
        let result = extract_concepts(&profile, &index, &shallow).unwrap();
        assert!(result.concept_keys().contains(&"it.ai"));
    }

    #[test]
    fn test_unmatched_tokens_reported_once() {
        let index = sample_index();
        let profile = student(&["quantum basket weaving", "Blockchain"], &["blockchain"]);
        let result = extract_concepts(&profile, &index, &ExtractionOptions::default()).unwrap();

        assert!(result.unmatched_tokens.contains(&"quantum basket weaving".to_string()));
        assert_eq!(
            result.unmatched_tokens.iter().filter(|t| *t == "blockchain").count(),
            1
        );
        assert_eq!(result.unmatched_by_field["interests"], vec!["blockchain"]);
    }

    #[test]
    fn test_partial_phrase_reports_missing_words() {
        let index = sample_index();
        let profile = student(&["deep learning for agriculture"], &[]);
        let result = extract_concepts(&profile, &index, &ExtractionOptions::default()).unwrap();
        assert!(result.concept_keys().contains(&"it.ai.machine_learning.deep_learning"));
        assert!(result.unmatched_tokens.contains(&"agriculture".to_string()));
    }

    #[test]
    fn test_empty_profile_is_error() {
        let index = sample_index();
        let profile = student(&["   "], &[]);
        let err = extract_concepts(&profile, &index, &ExtractionOptions::default()).unwrap_err();
        assert!(matches!(err, OntomatchError::EmptyProfile(id) if id == "s1"));
    }

    #[test]
    fn test_extract_pools_concept_embeddings() {
        let index = sample_index();
        let profile = student(&["machine learning"], &[]);
        let result = extract_concepts(&profile, &index, &ExtractionOptions::default()).unwrap();
        let extract = result.to_extract(&index);
        assert_eq!(extract.concepts.len(), result.concepts.len());
        assert!(extract.embedding.is_some());
    }
}
