use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{is_valid_key, parent_key, Concept};
use crate::core::error::Result;
use crate::db::{ConceptStore, UpsertOutcome};

const BUILTIN_TAXONOMY: &str = include_str!("../../../data/taxonomy.json");

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read taxonomy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid taxonomy document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid concept key: {0}")]
    InvalidKey(String),
    #[error("Duplicate concept key: {0}")]
    DuplicateKey(String),
    #[error("Concept {0} has an empty label")]
    EmptyLabel(String),
}


#[derive(Debug, Deserialize)]
struct TaxonomyDocument {
    #[serde(default)]
    version: Option<String>,
    concepts: Vec<Concept>,
}


#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeedReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

pub struct TaxonomyLoader;

impl TaxonomyLoader {
    pub fn parse(json: &str) -> std::result::Result<Vec<Concept>, LoaderError> {
        let document: TaxonomyDocument = serde_json::from_str(json)?;
        debug!(
            "Parsed taxonomy version {:?} with {} concepts",
            document.version,
            document.concepts.len()
        );
        Self::validate(&document.concepts)?;
        Ok(document.concepts)
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::result::Result<Vec<Concept>, LoaderError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let concepts = Self::parse(&json)?;
        info!("Loaded {} concepts from {}", concepts.len(), path.display());
        Ok(concepts)
    }

    /// Taxonomy shipped with the crate.
    pub fn builtin() -> std::result::Result<Vec<Concept>, LoaderError> {
        Self::parse(BUILTIN_TAXONOMY)
    }

    /// Keys must be well formed and unique, labels non-empty. A missing parent only
    /// warns: the matcher works on key prefixes, not on stored parent records.
    pub fn validate(concepts: &[Concept]) -> std::result::Result<(), LoaderError> {
        let mut keys = HashSet::new();
        for concept in concepts {
            if !is_valid_key(&concept.key) {
                return Err(LoaderError::InvalidKey(concept.key.clone()));
            }
            if concept.label.trim().is_empty() {
                return Err(LoaderError::EmptyLabel(concept.key.clone()));
            }
            if !keys.insert(concept.key.as_str()) {
                return Err(LoaderError::DuplicateKey(concept.key.clone()));
            }
        }

        for concept in concepts {
            if let Some(parent) = parent_key(&concept.key) {
                if !keys.contains(parent) {
                    warn!("Concept {} has no parent record {}", concept.key, parent);
                }
            }
        }
        Ok(())
    }

    /// Upserts every concept; running it twice with the same input changes nothing.
    pub async fn seed(store: &dyn ConceptStore, concepts: Vec<Concept>) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        for concept in concepts {
            match store.upsert_concept(concept).await? {
                UpsertOutcome::Inserted => report.inserted += 1,
                UpsertOutcome::Updated => report.updated += 1,
                UpsertOutcome::Unchanged => report.unchanged += 1,
            }
        }
        info!(
            "🌱 Taxonomy seeded: inserted={}, updated={}, unchanged={}",
            report.inserted, report.updated, report.unchanged
        );
        Ok(report)
    }
}
