use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::models::{ApproveCandidateRequest, CandidateQuery, ConceptCandidate, RejectCandidateRequest};
use crate::core::error::{OntomatchError, Result};
use crate::db::{CandidateStore, ConceptStore, Page};
use crate::toolkit::ontology::Concept;


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub candidate: ConceptCandidate,
    pub concept: Concept,
}


/// Administrative workflow over concept candidates. Every operation fails fast.
pub struct CandidateCuration {
    candidates: Arc<dyn CandidateStore>,
    concepts: Arc<dyn ConceptStore>,
}

impl CandidateCuration {
    pub fn new(candidates: Arc<dyn CandidateStore>, concepts: Arc<dyn ConceptStore>) -> Self {
        Self { candidates, concepts }
    }

    pub async fn list(&self, query: &CandidateQuery) -> Result<Page<ConceptCandidate>> {
        query.validate().map_err(OntomatchError::Validation)?;
        self.candidates.list_candidates(query).await
    }

    pub async fn get(&self, id: Uuid) -> Result<ConceptCandidate> {
        self.candidates
            .find_candidate(id)
            .await?
            .ok_or_else(|| OntomatchError::not_found("candidate", id))
    }

    /// Creates the concept named by the request and closes the candidate.
    pub async fn approve(&self, request: ApproveCandidateRequest) -> Result<ApprovalOutcome> {
        request.validate().map_err(OntomatchError::Validation)?;

        let mut candidate = self.get(request.candidate_id).await?;
        if !candidate.is_pending() {
            return Err(OntomatchError::InvalidState(format!(
                "candidate {} is already {}",
                candidate.id, candidate.status
            )));
        }
        if self.concepts.find_concept(&request.key).await?.is_some() {
            return Err(OntomatchError::Conflict(format!(
                "concept {} already exists",
                request.key
            )));
        }
        if let Some(parent) = &request.parent {
            if self.concepts.find_concept(parent).await?.is_none() {
                warn!("Approving {} under unknown parent {}", request.key, parent);
            }
        }

        let mut concept = Concept::new(request.key.clone(), request.label.trim(), request.aliases.clone());
        concept.description = request.description.clone();
        concept.updated_at = Some(Utc::now());
        self.concepts.insert_concept(concept.clone()).await?;

        candidate.mark_approved(&request.approved_by, &request.key, Utc::now())?;
        self.candidates.save_candidate(candidate.clone()).await?;

        info!(
            "Candidate '{}' approved as {} by {}",
            candidate.canonical, concept.key, request.approved_by
        );
        Ok(ApprovalOutcome { candidate, concept })
    }

    pub async fn reject(&self, request: RejectCandidateRequest) -> Result<ConceptCandidate> {
        request.validate().map_err(OntomatchError::Validation)?;

        let mut candidate = self.get(request.candidate_id).await?;
        candidate.mark_rejected(&request.rejected_by, request.reason.trim(), Utc::now())?;
        self.candidates.save_candidate(candidate.clone()).await?;

        info!("Candidate '{}' rejected by {}", candidate.canonical, request.rejected_by);
        Ok(candidate)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.candidates.delete_candidate(id).await? {
            info!("Candidate {} deleted", id);
            Ok(())
        } else {
            Err(OntomatchError::not_found("candidate", id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::db::InMemoryStore;
    use crate::toolkit::evolution::models::CandidateStatus;

    async fn setup() -> (Arc<InMemoryStore>, CandidateCuration, ConceptCandidate) {
        let store = Arc::new(InMemoryStore::new());
        store.insert_concept(Concept::new("it.security", "Security", vec![])).await.unwrap();
        let candidate = ConceptCandidate::new("zero trust", 4);
        store.save_candidate(candidate.clone()).await.unwrap();
        let curation = CandidateCuration::new(store.clone(), store.clone());
        (store, curation, candidate)
    }

    fn approve_request(id: Uuid, key: &str) -> ApproveCandidateRequest {
        ApproveCandidateRequest {
            candidate_id: id,
            key: key.to_string(),
            label: "Zero Trust".to_string(),
            aliases: vec!["zero trust architecture".to_string()],
            parent: Some("it.security".to_string()),
            description: None,
            approved_by: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_approve_creates_concept() {
        let (store, curation, candidate) = setup().await;
        let outcome = curation
            .approve(approve_request(candidate.id, "it.security.zero_trust"))
            .await
            .unwrap();

        assert_eq!(outcome.candidate.status, CandidateStatus::Approved);
        assert_eq!(outcome.candidate.approved_by.as_deref(), Some("admin"));
        assert!(outcome.candidate.approved_at.is_some());
        let concept = store.find_concept("it.security.zero_trust").await.unwrap().unwrap();
        assert_eq!(concept.label, "Zero Trust");

        let again = curation
            .approve(approve_request(candidate.id, "it.security.zero_trust_2"))
            .await
            .unwrap_err();
        assert_eq!(again.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_approve_conflict_leaves_candidate_pending() {
        let (store, curation, candidate) = setup().await;
        store
            .insert_concept(Concept::new("it.security.zero_trust", "Zero Trust", vec![]))
            .await
            .unwrap();
        let err = curation
            .approve(approve_request(candidate.id, "it.security.zero_trust"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(curation.get(candidate.id).await.unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_approve_validation_and_not_found() {
        let (_, curation, candidate) = setup().await;
        let mut bad = approve_request(candidate.id, "Not A Key");
        bad.parent = None;
        assert_eq!(curation.approve(bad).await.unwrap_err().kind(), ErrorKind::Validation);

        let missing = curation
            .approve(approve_request(Uuid::new_v4(), "it.security.zero_trust"))
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_reject_then_delete() {
        let (_, curation, candidate) = setup().await;
        let rejected = curation
            .reject(RejectCandidateRequest {
                candidate_id: candidate.id,
                reason: " not a research area ".to_string(),
                rejected_by: "admin".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(rejected.status, CandidateStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("not a research area"));

        let twice = curation
            .reject(RejectCandidateRequest {
                candidate_id: candidate.id,
                reason: "again".to_string(),
                rejected_by: "admin".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(twice.kind(), ErrorKind::InvalidState);

        curation.delete(candidate.id).await.unwrap();
        assert_eq!(curation.delete(candidate.id).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_rejects_bad_query() {
        let (_, curation, _) = setup().await;
        let query = CandidateQuery {
            page: 0,
            ..CandidateQuery::default()
        };
        assert_eq!(curation.list(&query).await.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(curation.list(&CandidateQuery::default()).await.unwrap().total, 1);
    }
}
