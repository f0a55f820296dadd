use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::core::error::{OntomatchError, Result, ValidationIssue};
use crate::db::Page;
use crate::toolkit::ontology::models::{is_valid_key, parent_key};
use crate::toolkit::profile::{ExtractionResult, Profile, ProfileType};

pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_REASON_CHARS: usize = 500;


#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CandidateStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl CandidateStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}


/// Where a token was seen. Two examples are the same when profile and token match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateExample {
    pub profile_id: String,
    pub profile_type: ProfileType,
    pub source_field: String,
    pub token: String,
}

impl CandidateExample {
    pub fn same_occurrence(&self, other: &CandidateExample) -> bool {
        self.profile_id == other.profile_id && self.token == other.token
    }
}


/// Unmatched tokens of one field of one profile, as fed to detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedRecord {
    pub profile_id: String,
    pub profile_type: ProfileType,
    pub source_field: String,
    pub unmatched_tokens: Vec<String>,
}

impl UnmatchedRecord {
    /// One record per field that produced unmatched tokens.
    pub fn from_extraction(profile: &Profile, result: &ExtractionResult) -> Vec<Self> {
        result
            .unmatched_by_field
            .iter()
            .filter(|(_, tokens)| !tokens.is_empty())
            .map(|(field, tokens)| Self {
                profile_id: profile.id.clone(),
                profile_type: profile.profile_type,
                source_field: field.clone(),
                unmatched_tokens: tokens.clone(),
            })
            .collect()
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptCandidate {
    pub id: Uuid,
    pub canonical: String,
    pub variants: Vec<String>,
    pub frequency: u64,
    pub examples: Vec<CandidateExample>,
    pub suggested_parent: String,
    pub suggested_label: String,
    pub suggested_aliases: Vec<String>,
    pub status: CandidateStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ConceptCandidate {
    pub fn new(canonical: impl Into<String>, frequency: u64) -> Self {
        let now = Utc::now();
        let canonical = canonical.into();
        Self {
            id: Uuid::new_v4(),
            variants: vec![canonical.clone()],
            suggested_label: canonical.clone(),
            canonical,
            frequency,
            examples: Vec::new(),
            suggested_parent: String::new(),
            suggested_aliases: Vec::new(),
            status: CandidateStatus::Pending,
            created_at: now,
            updated_at: now,
            approved_by: None,
            approved_at: None,
            approved_key: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == CandidateStatus::Pending
    }

    /// Appends `example` unless the same profile already contributed the same token or
    /// the list is full. Returns whether it was added.
    pub fn add_example(&mut self, example: CandidateExample, max_examples: usize) -> bool {
        if self.examples.len() >= max_examples
            || self.examples.iter().any(|e| e.same_occurrence(&example))
        {
            return false;
        }
        self.examples.push(example);
        true
    }

    pub fn add_variant(&mut self, variant: &str) -> bool {
        if self.variants.iter().any(|v| v == variant) {
            return false;
        }
        self.variants.push(variant.to_string());
        true
    }

    fn ensure_pending(&self, action: &str) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(OntomatchError::InvalidState(format!(
                "cannot {} candidate {}: status is {}",
                action, self.id, self.status
            )))
        }
    }

    pub fn mark_approved(&mut self, approved_by: &str, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.ensure_pending("approve")?;
        self.status = CandidateStatus::Approved;
        self.approved_by = Some(approved_by.to_string());
        self.approved_at = Some(at);
        self.approved_key = Some(key.to_string());
        self.updated_at = at;
        Ok(())
    }

    pub fn mark_rejected(&mut self, rejected_by: &str, reason: &str, at: DateTime<Utc>) -> Result<()> {
        self.ensure_pending("reject")?;
        self.status = CandidateStatus::Rejected;
        self.rejected_by = Some(rejected_by.to_string());
        self.rejected_at = Some(at);
        self.rejection_reason = Some(reason.to_string());
        self.updated_at = at;
        Ok(())
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveCandidateRequest {
    pub candidate_id: Uuid,
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// When given, `key` must sit directly under it.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub approved_by: String,
}

impl ApproveCandidateRequest {
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        if !is_valid_key(&self.key) {
            issues.push(ValidationIssue::new(
                "key",
                "must be dot-separated lowercase segments of [a-z0-9_]",
            ));
        }
        if self.label.trim().is_empty() {
            issues.push(ValidationIssue::new("label", "must not be empty"));
        }
        if self.aliases.iter().any(|a| a.trim().is_empty()) {
            issues.push(ValidationIssue::new("aliases", "must not contain empty entries"));
        }
        if self.approved_by.trim().is_empty() {
            issues.push(ValidationIssue::new("approved_by", "must not be empty"));
        }
        if let Some(parent) = &self.parent {
            if !is_valid_key(parent) {
                issues.push(ValidationIssue::new("parent", "is not a valid concept key"));
            } else if parent_key(&self.key) != Some(parent.as_str()) {
                issues.push(ValidationIssue::new(
                    "parent",
                    format!("key {} is not a direct child of {}", self.key, parent),
                ));
            }
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectCandidateRequest {
    pub candidate_id: Uuid,
    pub reason: String,
    pub rejected_by: String,
}

impl RejectCandidateRequest {
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        let reason = self.reason.trim();
        if reason.is_empty() {
            issues.push(ValidationIssue::new("reason", "is required"));
        } else if reason.chars().count() > MAX_REASON_CHARS {
            issues.push(ValidationIssue::new(
                "reason",
                format!("must be at most {} characters", MAX_REASON_CHARS),
            ));
        }
        if self.rejected_by.trim().is_empty() {
            issues.push(ValidationIssue::new("rejected_by", "must not be empty"));
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CandidateSort {
    #[default]
    Frequency,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}


/// Listing parameters. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateQuery {
    pub status: Option<CandidateStatus>,
    pub page: usize,
    pub page_size: usize,
    pub sort: CandidateSort,
    pub order: SortOrder,
}

impl Default for CandidateQuery {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: CandidateSort::default(),
            order: SortOrder::default(),
        }
    }
}

impl CandidateQuery {
    pub fn with_status(mut self, status: CandidateStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        if self.page == 0 {
            issues.push(ValidationIssue::new("page", "must be at least 1"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            issues.push(ValidationIssue::new(
                "page_size",
                format!("must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }
        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    /// Filters, sorts and paginates an unordered candidate set in memory.
    pub fn apply(&self, candidates: Vec<ConceptCandidate>) -> Page<ConceptCandidate> {
        let mut items: Vec<ConceptCandidate> = candidates
            .into_iter()
            .filter(|c| self.status.is_none_or(|status| c.status == status))
            .collect();

        items.sort_by(|a, b| {
            let primary = match self.sort {
                CandidateSort::Frequency => a.frequency.cmp(&b.frequency),
                CandidateSort::CreatedAt => a.created_at.cmp(&b.created_at),
                CandidateSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            let primary = match self.order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| a.canonical.cmp(&b.canonical))
        });

        let total = items.len();
        let page = self.page.max(1);
        let page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        let items = items
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();

        Page {
            items,
            total,
            page,
            page_size,
        }
    }
}
