use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::toolkit::text::{index_words, normalize, MIN_WORD_CHARS};

/// Fuzzy-token results under this score are discarded.
pub const FUZZY_TOKEN_MIN_SCORE: f64 = 0.3;

/// Substring results under this score are discarded.
pub const SUBSTRING_MIN_SCORE: f64 = 0.5;

const ROOT: usize = 0;


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrieEntry {
    pub concept_key: String,
    pub alias: String,
}


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredConcept {
    pub concept_key: String,
    pub alias: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TrieNode {
    children: BTreeMap<char, usize>,
    entries: BTreeSet<TrieEntry>,
}

/// Character-level prefix tree over normalized aliases, stored as an arena of nodes
/// addressed by index. Every alias is reachable through its full phrase and through
/// each of its words of at least [`MIN_WORD_CHARS`] characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptTrie {
    nodes: Vec<TrieNode>,
    aliases_indexed: usize,
}

impl Default for ConceptTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl ConceptTrie {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            aliases_indexed: 0,
        }
    }

    /// Indexes `alias` for `concept_key`. Returns false when the alias normalizes to
    /// nothing.
    pub fn insert(&mut self, concept_key: &str, alias: &str) -> bool {
        let normalized = normalize(alias);
        if normalized.is_empty() {
            return false;
        }

        let entry = TrieEntry {
            concept_key: concept_key.to_string(),
            alias: alias.to_string(),
        };

        self.insert_path(&normalized, entry.clone());
        for word in index_words(&normalized) {
            if word != normalized {
                self.insert_path(word, entry.clone());
            }
        }

        self.aliases_indexed += 1;
        true
    }

    fn insert_path(&mut self, path: &str, entry: TrieEntry) {
        let mut current = ROOT;
        for c in path.chars() {
            current = match self.nodes[current].children.get(&c) {
                Some(&next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[current].children.insert(c, next);
                    next
                }
            };
        }
        self.nodes[current].entries.insert(entry);
    }

    fn find_node(&self, text: &str) -> Option<usize> {
        let mut current = ROOT;
        for c in text.chars() {
            current = *self.nodes[current].children.get(&c)?;
        }
        Some(current)
    }

    /// Entries terminating exactly at `text` (expected to be normalized already).
    pub fn search_exact(&self, text: &str) -> Vec<TrieEntry> {
        if text.is_empty() {
            return Vec::new();
        }
        self.find_node(text)
            .map(|node| self.nodes[node].entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every entry whose indexed path starts with `text`.
    pub fn search_prefix(&self, text: &str) -> Vec<TrieEntry> {
        if text.is_empty() {
            return Vec::new();
        }
        match self.find_node(text) {
            Some(node) => self.collect_subtree(node).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn collect_subtree(&self, start: usize) -> BTreeSet<TrieEntry> {
        let mut found = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            let node = &self.nodes[node];
            found.extend(node.entries.iter().cloned());
            stack.extend(node.children.values().copied());
        }
        found
    }

    /// Scores each concept by the share of query words that hit it exactly.
    pub fn search_fuzzy_tokens(&self, text: &str) -> Vec<ScoredConcept> {
        let normalized = normalize(text);
        let mut tokens: Vec<&str> = Vec::new();
        for word in index_words(&normalized) {
            if !tokens.contains(&word) {
                tokens.push(word);
            }
        }
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut counts: HashMap<String, (usize, String)> = HashMap::new();
        for token in &tokens {
            let mut hit_keys = HashSet::new();
            for entry in self.search_exact(token) {
                if hit_keys.insert(entry.concept_key.clone()) {
                    counts
                        .entry(entry.concept_key)
                        .or_insert_with(|| (0, entry.alias))
                        .0 += 1;
                }
            }
        }

        let total = tokens.len() as f64;
        let results = counts
            .into_iter()
            .map(|(concept_key, (count, alias))| ScoredConcept {
                concept_key,
                alias,
                score: count as f64 / total,
            })
            .filter(|r| r.score >= FUZZY_TOKEN_MIN_SCORE)
            .collect();
        sort_scored(results)
    }

    /// Slides over every start position of the normalized query and follows the trie as
    /// far as the query allows. Every window of at least [`MIN_WORD_CHARS`] characters
    /// scores its length over the query length and credits the subtree it reaches;
    /// each concept keeps its best window.
    pub fn search_substring(&self, text: &str) -> Vec<ScoredConcept> {
        let normalized = normalize(text);
        let chars: Vec<char> = normalized.chars().collect();
        let total = chars.len();
        if total < MIN_WORD_CHARS {
            return Vec::new();
        }

        let mut best: HashMap<String, (f64, String)> = HashMap::new();
        for start in 0..total {
            if total - start < MIN_WORD_CHARS {
                break;
            }

            let mut path = Vec::new();
            let mut node = ROOT;
            for c in &chars[start..] {
                match self.nodes[node].children.get(c) {
                    Some(&next) => {
                        node = next;
                        path.push(next);
                    }
                    None => break,
                }
            }

            // deepest window first, so shorter windows only add concepts it missed
            let mut seen = HashSet::new();
            for (depth, &node) in path.iter().enumerate().rev() {
                let matched = depth + 1;
                let score = matched as f64 / total as f64;
                if matched < MIN_WORD_CHARS || score < SUBSTRING_MIN_SCORE {
                    break;
                }
                for entry in self.collect_subtree(node) {
                    if !seen.insert(entry.clone()) {
                        continue;
                    }
                    let slot = best
                        .entry(entry.concept_key)
                        .or_insert_with(|| (0.0, entry.alias.clone()));
                    if score > slot.0 {
                        *slot = (score, entry.alias);
                    }
                }
            }
        }

        let results = best
            .into_iter()
            .map(|(concept_key, (score, alias))| ScoredConcept {
                concept_key,
                alias,
                score,
            })
            .collect();
        sort_scored(results)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn aliases_indexed(&self) -> usize {
        self.aliases_indexed
    }

    pub fn to_snapshot(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn sort_scored(mut results: Vec<ScoredConcept>) -> Vec<ScoredConcept> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.concept_key.cmp(&b.concept_key))
    });
    results
}
