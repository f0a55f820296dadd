use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref CONCEPT_KEY: Regex = Regex::new(r"^[a-z0-9_]+(\.[a-z0-9_]+)*$").unwrap();
}

/// Depth of the "domain" ancestor used by the parent boost.
pub const DOMAIN_DEPTH: usize = 2;


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Concept {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Concept {
    pub fn new(key: impl Into<String>, label: impl Into<String>, aliases: Vec<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            aliases,
            embedding: None,
            description: None,
            updated_at: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn depth(&self) -> usize {
        key_depth(&self.key)
    }

    pub fn parent_key(&self) -> Option<&str> {
        parent_key(&self.key)
    }

    /// Label first, then aliases, in declaration order.
    pub fn surface_forms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.label.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Text sent to the embedding provider for this concept.
    pub fn embedding_text(&self) -> String {
        let mut text = self.label.clone();
        if !self.aliases.is_empty() {
            text.push_str(" (");
            text.push_str(&self.aliases.join(", "));
            text.push(')');
        }
        if let Some(description) = &self.description {
            text.push_str(": ");
            text.push_str(description);
        }
        text
    }

    /// True when the two records carry the same taxonomy content (embedding and
    /// timestamps are ignored).
    pub fn same_content(&self, other: &Concept) -> bool {
        self.key == other.key
            && self.label == other.label
            && self.aliases == other.aliases
            && self.description == other.description
    }
}

pub fn key_depth(key: &str) -> usize {
    if key.is_empty() {
        0
    } else {
        key.matches('.').count() + 1
    }
}

pub fn parent_key(key: &str) -> Option<&str> {
    key.rfind('.').map(|idx| &key[..idx])
}

/// Ancestor of `key` truncated to `depth` segments, `None` when the key is shallower.
pub fn ancestor_key(key: &str, depth: usize) -> Option<&str> {
    if depth == 0 || key_depth(key) < depth {
        return None;
    }
    let end = key
        .match_indices('.')
        .nth(depth - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(key.len());
    Some(&key[..end])
}

pub fn domain_key(key: &str) -> Option<&str> {
    ancestor_key(key, DOMAIN_DEPTH)
}

pub fn is_valid_key(key: &str) -> bool {
    CONCEPT_KEY.is_match(key)
}


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedConcept {
    pub key: String,
    pub label: String,
    pub depth: usize,
    pub parent: Option<String>,
    pub sources: BTreeSet<String>,
    pub matched_token: String,
}

impl ExtractedConcept {
    pub fn from_concept(concept: &Concept, source: &str, matched_token: &str) -> Self {
        Self {
            key: concept.key.clone(),
            label: concept.label.clone(),
            depth: concept.depth(),
            parent: concept.parent_key().map(str::to_string),
            sources: BTreeSet::from([source.to_string()]),
            matched_token: matched_token.to_string(),
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OntologyStats {
    pub total_concepts: usize,
    pub total_aliases: usize,
    pub concepts_by_depth: BTreeMap<usize, usize>,
    pub max_depth: usize,
    pub trie_built: bool,
    pub trie_nodes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_depth() {
        assert_eq!(key_depth("it"), 1);
        assert_eq!(key_depth("it.ai.machine_learning"), 3);
        assert_eq!(key_depth(""), 0);
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(parent_key("it.ai.nlp"), Some("it.ai"));
        assert_eq!(parent_key("it"), None);
        assert_eq!(domain_key("it.ai.nlp.parsing"), Some("it.ai"));
        assert_eq!(domain_key("it.ai"), Some("it.ai"));
        assert_eq!(domain_key("it"), None);
        assert_eq!(ancestor_key("a.b.c", 1), Some("a"));
        assert_eq!(ancestor_key("a.b.c", 3), Some("a.b.c"));
    }

    #[test]
    fn test_key_validation() {
        assert!(is_valid_key("it.ai.machine_learning"));
        assert!(!is_valid_key("it..ai"));
        assert!(!is_valid_key("IT.AI"));
        assert!(!is_valid_key(".it"));
    }

    #[test]
    fn test_embedding_text() {
        let concept = Concept::new("it.ai.nlp", "NLP", vec!["xu ly ngon ngu".to_string()]);
        assert_eq!(concept.embedding_text(), "NLP (xu ly ngon ngu)");
    }
}
