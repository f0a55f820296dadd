use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use super::client::HelixClient;
use super::store::{
    CandidateStore, ConceptStore, Page, ProfileStore, UpsertOutcome, VectorHit, VectorQuery,
    VectorRecord, VectorStore, META_KIND, META_LECTURER_ID,
};
use crate::core::error::{OntomatchError, Result};
use crate::toolkit::evolution::{CandidateQuery, ConceptCandidate};
use crate::toolkit::ontology::Concept;
use crate::toolkit::profile::{OntologyExtract, Profile, ProfileType};

/// Extra candidates fetched per requested hit when a metadata filter is applied after
/// the vector search.
const FILTER_OVERFETCH: usize = 4;

/// Node shape shared by concepts, candidates and profiles: indexed scalar columns plus
/// the full record as JSON.
#[derive(Debug, Deserialize)]
struct PayloadNode {
    payload: String,
}

impl PayloadNode {
    fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

#[derive(Debug, Deserialize)]
struct ConceptsResponse {
    #[serde(default)]
    concepts: Vec<PayloadNode>,
}

#[derive(Debug, Deserialize)]
struct ConceptResponse {
    concept: PayloadNode,
}

#[derive(Debug, Deserialize)]
struct CandidatesResponse {
    #[serde(default)]
    candidates: Vec<PayloadNode>,
}

#[derive(Debug, Deserialize)]
struct CandidateResponse {
    candidate: PayloadNode,
}

#[derive(Debug, Deserialize)]
struct ProfilesResponse {
    #[serde(default)]
    profiles: Vec<PayloadNode>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    profile: PayloadNode,
}

#[derive(Debug, Serialize)]
struct CandidateParams<'a> {
    candidate_id: String,
    canonical: &'a str,
    status: &'a str,
    frequency: u64,
    payload: String,
}

#[derive(Debug, Serialize)]
struct VectorParams<'a> {
    record_id: &'a str,
    text: &'a str,
    vector: Vec<f64>,
    kind: &'a str,
    lecturer_id: &'a str,
    metadata: String,
}

#[derive(Debug, Deserialize)]
struct VectorSearchResponse {
    #[serde(default)]
    records: Vec<VectorNode>,
}

#[derive(Debug, Deserialize)]
struct VectorNode {
    record_id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: String,
    #[serde(default)]
    score: f64,
}


/// Storage traits over HelixDB named queries.
pub struct HelixStore {
    client: Arc<HelixClient>,
}

impl HelixStore {
    pub fn new(client: Arc<HelixClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &HelixClient {
        &self.client
    }

    fn decode_all<T: DeserializeOwned>(nodes: &[PayloadNode]) -> Vec<T> {
        nodes
            .iter()
            .filter_map(|node| match node.decode() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Skipping undecodable record: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl ConceptStore for HelixStore {
    async fn list_concepts(&self) -> Result<Vec<Concept>> {
        let response: ConceptsResponse = self.client.execute_query("getAllConcepts", &json!({})).await?;
        Ok(Self::decode_all(&response.concepts))
    }

    async fn find_concept(&self, key: &str) -> Result<Option<Concept>> {
        let response: Option<ConceptResponse> = self
            .client
            .execute_optional("getConceptByKey", &json!({ "key": key }))
            .await?;
        response.map(|r| r.concept.decode()).transpose()
    }

    async fn insert_concept(&self, concept: Concept) -> Result<()> {
        if self.find_concept(&concept.key).await?.is_some() {
            return Err(OntomatchError::Conflict(format!(
                "concept {} already exists",
                concept.key
            )));
        }
        let params = json!({
            "key": concept.key,
            "label": concept.label,
            "payload": serde_json::to_string(&concept)?,
        });
        let _: serde_json::Value = self.client.execute_query("addConcept", &params).await?;
        Ok(())
    }

    async fn upsert_concept(&self, mut concept: Concept) -> Result<UpsertOutcome> {
        let existing = self.find_concept(&concept.key).await?;
        let (query, outcome) = match &existing {
            None => ("addConcept", UpsertOutcome::Inserted),
            Some(existing)
                if existing.same_content(&concept)
                    && (concept.embedding.is_none() || existing.embedding == concept.embedding) =>
            {
                return Ok(UpsertOutcome::Unchanged);
            }
            Some(existing) => {
                if concept.embedding.is_none() {
                    concept.embedding = existing.embedding.clone();
                }
                ("updateConcept", UpsertOutcome::Updated)
            }
        };

        concept.updated_at = Some(Utc::now());
        let params = json!({
            "key": concept.key,
            "label": concept.label,
            "payload": serde_json::to_string(&concept)?,
        });
        let _: serde_json::Value = self.client.execute_query(query, &params).await?;
        Ok(outcome)
    }
}

#[async_trait]
impl CandidateStore for HelixStore {
    async fn find_candidate(&self, id: Uuid) -> Result<Option<ConceptCandidate>> {
        let response: Option<CandidateResponse> = self
            .client
            .execute_optional("getCandidateById", &json!({ "candidate_id": id.to_string() }))
            .await?;
        response.map(|r| r.candidate.decode()).transpose()
    }

    async fn find_by_canonical(&self, canonical: &str) -> Result<Option<ConceptCandidate>> {
        let response: Option<CandidateResponse> = self
            .client
            .execute_optional("getCandidateByCanonical", &json!({ "canonical": canonical }))
            .await?;
        response.map(|r| r.candidate.decode()).transpose()
    }

    async fn save_candidate(&self, candidate: ConceptCandidate) -> Result<()> {
        let existing = self.find_by_canonical(&candidate.canonical).await?;
        let params = CandidateParams {
            candidate_id: candidate.id.to_string(),
            canonical: &candidate.canonical,
            status: candidate.status.as_ref(),
            frequency: candidate.frequency,
            payload: serde_json::to_string(&candidate)?,
        };

        let query = match existing {
            Some(existing) if existing.id == candidate.id => "updateCandidate",
            Some(existing) => {
                debug!("Replacing candidate {} for '{}'", existing.id, candidate.canonical);
                self.delete_candidate(existing.id).await?;
                "addCandidate"
            }
            None => "addCandidate",
        };
        let _: serde_json::Value = self.client.execute_query(query, &params).await?;
        Ok(())
    }

    async fn list_candidates(&self, query: &CandidateQuery) -> Result<Page<ConceptCandidate>> {
        let response: CandidatesResponse = match query.status {
            Some(status) => {
                self.client
                    .execute_query("getCandidatesByStatus", &json!({ "status": status.as_ref() }))
                    .await?
            }
            None => self.client.execute_query("getAllCandidates", &json!({})).await?,
        };
        Ok(query.apply(Self::decode_all(&response.candidates)))
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool> {
        let deleted: Option<serde_json::Value> = self
            .client
            .execute_optional("deleteCandidate", &json!({ "candidate_id": id.to_string() }))
            .await?;
        Ok(deleted.is_some())
    }
}

#[async_trait]
impl ProfileStore for HelixStore {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let response: Option<ProfileResponse> = self
            .client
            .execute_optional("getProfileById", &json!({ "profile_id": id }))
            .await?;
        response.map(|r| r.profile.decode()).transpose()
    }

    async fn list_profiles(&self, profile_type: ProfileType) -> Result<Vec<Profile>> {
        let response: ProfilesResponse = self
            .client
            .execute_query("getProfilesByType", &json!({ "profile_type": profile_type.as_ref() }))
            .await?;
        Ok(Self::decode_all(&response.profiles))
    }

    async fn list_updated_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Profile>> {
        let response: ProfilesResponse = match since {
            Some(since) => {
                self.client
                    .execute_query("getProfilesUpdatedSince", &json!({ "since": since.to_rfc3339() }))
                    .await?
            }
            None => self.client.execute_query("getAllProfiles", &json!({})).await?,
        };
        let profiles: Vec<Profile> = Self::decode_all(&response.profiles);
        Ok(profiles
            .into_iter()
            .filter(|p| since.is_none_or(|since| p.updated_at.is_some_and(|u| u > since)))
            .collect())
    }

    async fn save_ontology_extract(&self, profile_id: &str, extract: OntologyExtract) -> Result<()> {
        let mut profile = self
            .get_profile(profile_id)
            .await?
            .ok_or_else(|| OntomatchError::not_found("profile", profile_id))?;
        profile.ontology_extract = Some(extract);

        let params = json!({
            "profile_id": profile_id,
            "payload": serde_json::to_string(&profile)?,
        });
        let _: serde_json::Value = self.client.execute_query("updateProfilePayload", &params).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for HelixStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let mut written = 0;
        for record in &records {
            let params = VectorParams {
                record_id: &record.id,
                text: &record.text,
                vector: record.vector.iter().map(|v| f64::from(*v)).collect(),
                kind: record.metadata.get(META_KIND).map(String::as_str).unwrap_or_default(),
                lecturer_id: record
                    .metadata
                    .get(META_LECTURER_ID)
                    .map(String::as_str)
                    .unwrap_or_default(),
                metadata: serde_json::to_string(&record.metadata)?,
            };
            let _: serde_json::Value = self.client.execute_query("upsertVectorRecord", &params).await?;
            written += 1;
        }
        Ok(written)
    }

    async fn query(&self, query: VectorQuery) -> Result<Vec<VectorHit>> {
        let limit = if query.filter.is_some() {
            query.top_k * FILTER_OVERFETCH
        } else {
            query.top_k
        };
        let params = json!({
            "query_vector": query.vector.iter().map(|v| f64::from(*v)).collect::<Vec<f64>>(),
            "limit": limit,
        });
        let response: VectorSearchResponse =
            self.client.execute_query("searchVectorRecords", &params).await?;

        let mut hits: Vec<VectorHit> = response
            .records
            .into_iter()
            .map(|node| VectorHit {
                id: node.record_id,
                text: node.text,
                score: node.score,
                metadata: serde_json::from_str::<BTreeMap<String, String>>(&node.metadata)
                    .unwrap_or_default(),
            })
            .filter(|hit| query.filter.as_ref().is_none_or(|f| f.matches(&hit.metadata)))
            .collect();
        hits.truncate(query.top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_node_decodes_records() {
        let concept = Concept::new("it.ai", "AI", vec!["trí tuệ nhân tạo".to_string()]);
        let body = json!({ "concepts": [{ "payload": serde_json::to_string(&concept).unwrap() }, { "payload": "{" }] });
        let response: ConceptsResponse = serde_json::from_value(body).unwrap();
        let decoded: Vec<Concept> = HelixStore::decode_all(&response.concepts);
        assert_eq!(decoded, vec![concept]);
    }

    #[test]
    fn test_vector_node_defaults() {
        let response: VectorSearchResponse =
            serde_json::from_value(json!({ "records": [{ "record_id": "c1" }] })).unwrap();
        assert_eq!(response.records[0].score, 0.0);
        assert!(response.records[0].metadata.is_empty());
    }
}
