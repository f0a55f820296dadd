pub mod curation;
pub mod detector;
pub mod job;
pub mod models;
pub mod suggest;

pub use curation::{ApprovalOutcome, CandidateCuration};
pub use detector::{
    cluster_tokens, is_candidate_token, tokens_similar, CandidateDetector, DetectionOptions,
    DetectionReport, TokenCluster,
};
pub use job::{CandidateDetectionJob, JobOutcome, JobReport};
pub use models::{
    ApproveCandidateRequest, CandidateExample, CandidateQuery, CandidateSort, CandidateStatus,
    ConceptCandidate, RejectCandidateRequest, SortOrder, UnmatchedRecord,
};
