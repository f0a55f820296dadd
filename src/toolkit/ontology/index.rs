use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::models::{is_valid_key, Concept, OntologyStats};
use super::trie::{ConceptTrie, ScoredConcept};
use super::OntologyError;
use crate::toolkit::similarity::cosine_similarity;
use crate::toolkit::text::normalize;

/// Fuzzy-token matches are accepted when the best score reaches this value.
pub const FUZZY_ACCEPT_SCORE: f64 = 0.6;

/// Substring matches are accepted when the best score reaches this value.
pub const SUBSTRING_ACCEPT_SCORE: f64 = 0.7;

/// Cosine floor for the embedding step of the linear-scan lookup.
pub const LEGACY_EMBEDDING_MIN_SIMILARITY: f64 = 0.7;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    FuzzyToken,
    Substring,
    LegacyLabel,
    LegacyAlias,
    LegacyEmbedding,
}


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptHit {
    pub concept_key: String,
    pub alias: String,
    pub score: f64,
    pub method: MatchMethod,
}

impl ConceptHit {
    fn from_scored(scored: ScoredConcept, method: MatchMethod) -> Self {
        Self {
            concept_key: scored.concept_key,
            alias: scored.alias,
            score: scored.score,
            method,
        }
    }
}

/// Immutable view of the taxonomy plus its alias trie. A new index is built for every
/// reload; readers hold an `Arc` to the instance they started with.
#[derive(Debug, Clone, Default)]
pub struct ConceptIndex {
    concepts: BTreeMap<String, Concept>,
    trie: Option<ConceptTrie>,
}

impl ConceptIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(concepts: Vec<Concept>) -> Result<Self, OntologyError> {
        let concepts = Self::collect(concepts)?;

        let mut trie = ConceptTrie::new();
        for concept in concepts.values() {
            for form in concept.surface_forms() {
                trie.insert(&concept.key, form);
            }
        }

        info!(
            "Concept index built: {} concepts, {} aliases, {} trie nodes",
            concepts.len(),
            trie.aliases_indexed(),
            trie.node_count()
        );

        Ok(Self {
            concepts,
            trie: Some(trie),
        })
    }

    /// Index served by the linear scan only.
    pub fn without_trie(concepts: Vec<Concept>) -> Result<Self, OntologyError> {
        let concepts = Self::collect(concepts)?;
        warn!(
            "Concept index running without trie ({} concepts): lookups use linear scan",
            concepts.len()
        );
        Ok(Self {
            concepts,
            trie: None,
        })
    }

    /// Restores an index from a persisted trie snapshot.
    pub fn from_snapshot(concepts: Vec<Concept>, snapshot: &[u8]) -> Result<Self, OntologyError> {
        let concepts = Self::collect(concepts)?;
        let trie = ConceptTrie::from_snapshot(snapshot)?;
        Ok(Self {
            concepts,
            trie: Some(trie),
        })
    }

    fn collect(concepts: Vec<Concept>) -> Result<BTreeMap<String, Concept>, OntologyError> {
        let mut map = BTreeMap::new();
        for concept in concepts {
            if !is_valid_key(&concept.key) {
                return Err(OntologyError::InvalidKey(concept.key));
            }
            if map.contains_key(&concept.key) {
                return Err(OntologyError::DuplicateKey(concept.key));
            }
            map.insert(concept.key.clone(), concept);
        }
        Ok(map)
    }

    pub fn has_trie(&self) -> bool {
        self.trie.is_some()
    }

    pub fn trie(&self) -> Option<&ConceptTrie> {
        self.trie.as_ref()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn concept(&self, key: &str) -> Option<&Concept> {
        self.concepts.get(key)
    }

    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }

    /// Resolves free text to concepts: exact, then fuzzy-token, then substring. The first
    /// stage with an acceptable hit wins.
    pub fn resolve(&self, text: &str) -> Vec<ConceptHit> {
        self.resolve_with_embedding(text, None)
    }

    /// Same as [`resolve`](Self::resolve); the query embedding is only consulted by the
    /// linear scan used when no trie is available.
    pub fn resolve_with_embedding(
        &self,
        text: &str,
        query_embedding: Option<&[f32]>,
    ) -> Vec<ConceptHit> {
        match &self.trie {
            Some(trie) => Self::resolve_with_trie(trie, text),
            None => self.linear_scan(text, query_embedding),
        }
    }

    fn resolve_with_trie(trie: &ConceptTrie, text: &str) -> Vec<ConceptHit> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let exact: Vec<ConceptHit> = trie
            .search_exact(&normalized)
            .into_iter()
            .filter(|entry| seen.insert(entry.concept_key.clone()))
            .map(|entry| ConceptHit {
                concept_key: entry.concept_key,
                alias: entry.alias,
                score: 1.0,
                method: MatchMethod::Exact,
            })
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        let fuzzy = trie.search_fuzzy_tokens(&normalized);
        if accepted(&fuzzy, FUZZY_ACCEPT_SCORE) {
            return fuzzy
                .into_iter()
                .filter(|r| r.score >= FUZZY_ACCEPT_SCORE)
                .map(|r| ConceptHit::from_scored(r, MatchMethod::FuzzyToken))
                .collect();
        }

        let substring = trie.search_substring(&normalized);
        if accepted(&substring, SUBSTRING_ACCEPT_SCORE) {
            return substring
                .into_iter()
                .filter(|r| r.score >= SUBSTRING_ACCEPT_SCORE)
                .map(|r| ConceptHit::from_scored(r, MatchMethod::Substring))
                .collect();
        }

        Vec::new()
    }

    fn linear_scan(&self, text: &str, query_embedding: Option<&[f32]>) -> Vec<ConceptHit> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        debug!("Linear-scan concept lookup for '{}'", crate::safe_truncate(&normalized, 50));

        for concept in self.concepts.values() {
            if normalize(&concept.label) == normalized {
                return vec![ConceptHit {
                    concept_key: concept.key.clone(),
                    alias: concept.label.clone(),
                    score: 1.0,
                    method: MatchMethod::LegacyLabel,
                }];
            }
        }

        for concept in self.concepts.values() {
            if let Some(alias) = concept.aliases.iter().find(|a| normalize(a) == normalized) {
                return vec![ConceptHit {
                    concept_key: concept.key.clone(),
                    alias: alias.clone(),
                    score: 1.0,
                    method: MatchMethod::LegacyAlias,
                }];
            }
        }

        let Some(query) = query_embedding else {
            return Vec::new();
        };

        let mut hits: Vec<ConceptHit> = self
            .concepts
            .values()
            .filter_map(|concept| {
                let embedding = concept.embedding.as_deref()?;
                let similarity = cosine_similarity(query, embedding);
                (similarity > LEGACY_EMBEDDING_MIN_SIMILARITY).then(|| ConceptHit {
                    concept_key: concept.key.clone(),
                    alias: concept.label.clone(),
                    score: similarity,
                    method: MatchMethod::LegacyEmbedding,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.concept_key.cmp(&b.concept_key))
        });
        hits
    }

    pub fn stats(&self) -> OntologyStats {
        let mut stats = OntologyStats {
            total_concepts: self.concepts.len(),
            trie_built: self.trie.is_some(),
            trie_nodes: self.trie.as_ref().map_or(0, ConceptTrie::node_count),
            ..Default::default()
        };
        for concept in self.concepts.values() {
            let depth = concept.depth();
            stats.total_aliases += concept.aliases.len();
            *stats.concepts_by_depth.entry(depth).or_insert(0) += 1;
            stats.max_depth = stats.max_depth.max(depth);
        }
        stats
    }
}

fn accepted(results: &[ScoredConcept], floor: f64) -> bool {
    results.first().is_some_and(|top| top.score >= floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(key: &str, label: &str, aliases: &[&str]) -> Concept {
        Concept::new(key, label, aliases.iter().map(|a| a.to_string()).collect())
    }

    fn sample() -> Vec<Concept> {
        vec![
            concept("it", "Information Technology", &["cntt"]),
            concept("it.ai", "Artificial Intelligence", &["AI", "trí tuệ nhân tạo"]),
            concept("it.ai.machine_learning", "Machine Learning", &["ML", "học máy"]),
            concept("it.ai.deep_learning", "Deep Learning", &["học sâu"]),
            concept(
                "it.ai.nlp",
                "Natural Language Processing",
                &["NLP", "xử lý ngôn ngữ tự nhiên"],
            ),
            concept("it.data.data_mining", "Data Mining", &["khai phá dữ liệu"]),
        ]
    }

    fn keys(hits: &[ConceptHit]) -> Vec<&str> {
        hits.iter().map(|h| h.concept_key.as_str()).collect()
    }

    #[test]
    fn test_build_rejects_duplicates_and_bad_keys() {
        let mut concepts = sample();
        concepts.push(concept("it.ai", "Duplicate", &[]));
        assert!(matches!(
            ConceptIndex::build(concepts),
            Err(OntologyError::DuplicateKey(key)) if key == "it.ai"
        ));
        assert!(matches!(
            ConceptIndex::build(vec![concept("It.AI", "x", &[])]),
            Err(OntologyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_resolve_exact_alias() {
        let index = ConceptIndex::build(sample()).unwrap();
        let hits = index.resolve("Học Máy");
        assert_eq!(keys(&hits), vec!["it.ai.machine_learning"]);
        assert_eq!(hits[0].method, MatchMethod::Exact);
        assert_eq!(hits[0].alias, "học máy");
    }

    #[test]
    fn test_resolve_fuzzy_tokens() {
        let index = ConceptIndex::build(sample()).unwrap();
        let hits = index.resolve("natural language processing techniques");
        assert_eq!(keys(&hits), vec!["it.ai.nlp"]);
        assert_eq!(hits[0].method, MatchMethod::FuzzyToken);
        assert!((hits[0].score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_substring() {
        let index = ConceptIndex::build(sample()).unwrap();
        let hits = index.resolve("datamining");
        assert!(hits.is_empty());
        let hits = index.resolve("data minin");
        assert_eq!(keys(&hits), vec!["it.data.data_mining"]);
        assert_eq!(hits[0].method, MatchMethod::Substring);
    }

    #[test]
    fn test_resolve_no_match() {
        let index = ConceptIndex::build(sample()).unwrap();
        assert!(index.resolve("quantum chromodynamics").is_empty());
        assert!(index.resolve("   ").is_empty());
    }

    #[test]
    fn test_linear_scan_label_alias_embedding() {
        let mut concepts = sample();
        concepts[5] = concepts[5].clone().with_embedding(vec![1.0, 0.0, 0.0]);
        let index = ConceptIndex::without_trie(concepts).unwrap();
        assert!(!index.has_trie());

        let hits = index.resolve("machine learning");
        assert_eq!(hits[0].method, MatchMethod::LegacyLabel);

        let hits = index.resolve("hoc sau");
        assert_eq!(keys(&hits), vec!["it.ai.deep_learning"]);
        assert_eq!(hits[0].method, MatchMethod::LegacyAlias);

        let hits = index.resolve_with_embedding("mining of data", Some(&[0.9, 0.1, 0.0]));
        assert_eq!(keys(&hits), vec!["it.data.data_mining"]);
        assert_eq!(hits[0].method, MatchMethod::LegacyEmbedding);

        assert!(index.resolve_with_embedding("mining of data", Some(&[0.0, 1.0, 0.0])).is_empty());
    }

    #[test]
    fn test_snapshot_restores_lookups() {
        let index = ConceptIndex::build(sample()).unwrap();
        let bytes = index.trie().unwrap().to_snapshot().unwrap();
        let restored = ConceptIndex::from_snapshot(sample(), &bytes).unwrap();
        assert_eq!(
            keys(&restored.resolve("xử lý ngôn ngữ tự nhiên")),
            vec!["it.ai.nlp"]
        );
    }

    #[test]
    fn test_stats() {
        let index = ConceptIndex::build(sample()).unwrap();
        let stats = index.stats();
        assert_eq!(stats.total_concepts, 6);
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.concepts_by_depth.get(&3), Some(&4));
        assert!(stats.trie_built);
        assert!(stats.trie_nodes > 1);
    }
}
