use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::db::HelixClientError;
use crate::llm::embeddings::EmbeddingError;
use crate::llm::providers::LlmProviderError;
use crate::toolkit::ontology::OntologyError;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    EmptyProfile,
    ProviderFailure,
    Conflict,
    Validation,
    Storage,
    Config,
}

/// One rejected field of a request or configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}


#[derive(Error, Debug)]
pub enum OntomatchError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Profile {0} has no extractable text")]
    EmptyProfile(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("LLM provider error: {0}")]
    LlmProvider(#[from] LlmProviderError),

    #[error("Ontology error: {0}")]
    Ontology(#[from] OntologyError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HelixDB error: {0}")]
    Database(#[from] HelixClientError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OntomatchError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::EmptyProfile(_) => ErrorKind::EmptyProfile,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Embedding(_) | Self::LlmProvider(_) => ErrorKind::ProviderFailure,
            Self::Ontology(OntologyError::DuplicateKey(_)) => ErrorKind::Conflict,
            Self::Ontology(_) => ErrorKind::Validation,
            Self::Storage(_) | Self::Database(_) | Self::Serialization(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}


pub type Result<T> = std::result::Result<T, OntomatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            OntomatchError::not_found("candidate", "abc").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            OntomatchError::LlmProvider(LlmProviderError::Provider("down".into())).kind(),
            ErrorKind::ProviderFailure
        );
        assert_eq!(
            OntomatchError::Ontology(OntologyError::DuplicateKey("it".into())).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(ErrorKind::InvalidState.to_string(), "invalid_state");
    }

    #[test]
    fn test_validation_message_lists_issues() {
        let err = OntomatchError::Validation(vec![
            ValidationIssue::new("key", "must not be empty"),
            ValidationIssue::new("label", "too long"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: key: must not be empty; label: too long"
        );
    }
}
