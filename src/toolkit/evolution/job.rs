use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::detector::{CandidateDetector, DetectionReport};
use super::models::UnmatchedRecord;
use crate::core::error::{OntomatchError, Result};
use crate::db::ProfileStore;
use crate::toolkit::ontology::ConceptIndexService;
use crate::toolkit::profile::{extract_concepts, ExtractionOptions};


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub since: Option<DateTime<Utc>>,
    pub profiles_scanned: usize,
    pub profiles_skipped: usize,
    pub extracts_saved: usize,
    pub detection: DetectionReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed(JobReport),
    /// Another run was in progress.
    Skipped,
}

/// Clears the running flag when the run ends, including on error.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}


/// Re-extracts profiles changed since the last successful run and feeds their unmatched
/// tokens to the detector. At most one run executes at a time.
pub struct CandidateDetectionJob {
    profiles: Arc<dyn ProfileStore>,
    index: Arc<ConceptIndexService>,
    detector: CandidateDetector,
    extraction: ExtractionOptions,
    running: AtomicBool,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

impl CandidateDetectionJob {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        index: Arc<ConceptIndexService>,
        detector: CandidateDetector,
        extraction: ExtractionOptions,
    ) -> Self {
        Self {
            profiles,
            index,
            detector,
            extraction,
            running: AtomicBool::new(false),
            last_run: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run.lock()
    }

    pub async fn run(&self) -> Result<JobOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Candidate detection already running, trigger ignored");
            return Ok(JobOutcome::Skipped);
        }
        let _guard = RunGuard(&self.running);

        if !self.index.is_ready() {
            return Err(OntomatchError::InvalidState(
                "concept index is not loaded; detection would flag every token".to_string(),
            ));
        }

        let started_at = Utc::now();
        let since = self.last_run();
        info!("Candidate detection started (since={:?})", since);

        let index = self.index.snapshot();
        let profiles = self.profiles.list_updated_since(since).await?;

        let mut batch: Vec<UnmatchedRecord> = Vec::new();
        let mut skipped = 0;
        let mut saved = 0;
        for profile in &profiles {
            let result = match extract_concepts(profile, &index, &self.extraction) {
                Ok(result) => result,
                Err(OntomatchError::EmptyProfile(id)) => {
                    debug!("Profile {} has no extractable text", id);
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self
                .profiles
                .save_ontology_extract(&profile.id, result.to_extract(&index))
                .await
            {
                Ok(()) => saved += 1,
                Err(e) => warn!("Failed to store ontology extract for {}: {}", profile.id, e),
            }
            batch.extend(UnmatchedRecord::from_extraction(profile, &result));
        }

        let detection = self.detector.detect(&batch).await?;
        *self.last_run.lock() = Some(started_at);

        let report = JobReport {
            started_at,
            finished_at: Utc::now(),
            since,
            profiles_scanned: profiles.len(),
            profiles_skipped: skipped,
            extracts_saved: saved,
            detection,
        };
        info!(
            "Candidate detection finished: {} profiles, {} new candidates, {} updated",
            report.profiles_scanned,
            report.detection.created.len(),
            report.detection.updated.len()
        );
        Ok(JobOutcome::Completed(report))
    }

    /// Runs the job every `period`, first tick immediately, until `shutdown` turns true
    /// or its sender is dropped.
    pub fn spawn_schedule(
        job: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Candidate detection scheduled every {:?}", period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = job.run().await {
                            error!("Candidate detection failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Candidate detection schedule stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CandidateStore, InMemoryStore};
    use crate::testing::{sample_index, sample_profiles};
    use crate::toolkit::evolution::DetectionOptions;
    use crate::toolkit::profile::{OntologyExtract, Profile, ProfileType};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Profile store whose listing waits for a signal.
    struct GatedProfiles {
        inner: InMemoryStore,
        gate: Notify,
    }

    #[async_trait]
    impl ProfileStore for GatedProfiles {
        async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
            self.inner.get_profile(id).await
        }

        async fn list_profiles(&self, profile_type: ProfileType) -> Result<Vec<Profile>> {
            self.inner.list_profiles(profile_type).await
        }

        async fn list_updated_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Profile>> {
            self.gate.notified().await;
            self.inner.list_updated_since(since).await
        }

        async fn save_ontology_extract(&self, profile_id: &str, extract: OntologyExtract) -> Result<()> {
            self.inner.save_ontology_extract(profile_id, extract).await
        }
    }

    fn job_over(profiles: Arc<dyn ProfileStore>, candidates: Arc<InMemoryStore>) -> CandidateDetectionJob {
        CandidateDetectionJob::new(
            profiles,
            Arc::new(ConceptIndexService::with_index(sample_index())),
            CandidateDetector::new(candidates, DetectionOptions::default()),
            ExtractionOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_run_detects_and_advances_watermark() {
        let store = Arc::new(InMemoryStore::new());
        for profile in sample_profiles() {
            store.insert_profile(profile);
        }
        let job = job_over(store.clone(), store.clone());

        let JobOutcome::Completed(report) = job.run().await.unwrap() else {
            panic!("first run should complete");
        };
        assert!(report.profiles_scanned > 0);
        assert!(report.detection.created.contains(&"blockchain".to_string()));
        assert!(store.find_by_canonical("blockchain").await.unwrap().is_some());
        assert_eq!(job.last_run(), Some(report.started_at));

        let JobOutcome::Completed(second) = job.run().await.unwrap() else {
            panic!("second run should complete");
        };
        assert_eq!(second.profiles_scanned, 0);
        assert_eq!(second.since, Some(report.started_at));
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_skipped() {
        let gated = Arc::new(GatedProfiles {
            inner: InMemoryStore::new(),
            gate: Notify::new(),
        });
        let job = Arc::new(job_over(gated.clone(), Arc::new(InMemoryStore::new())));

        let first = tokio::spawn({
            let job = job.clone();
            async move { job.run().await }
        });
        while !job.is_running() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(job.run().await.unwrap(), JobOutcome::Skipped));

        gated.gate.notify_one();
        assert!(matches!(first.await.unwrap().unwrap(), JobOutcome::Completed(_)));
        assert!(!job.is_running());
    }

    #[tokio::test]
    async fn test_refuses_to_run_without_index() {
        let store = Arc::new(InMemoryStore::new());
        let job = CandidateDetectionJob::new(
            store.clone(),
            Arc::new(ConceptIndexService::new()),
            CandidateDetector::new(store, DetectionOptions::default()),
            ExtractionOptions::default(),
        );
        assert!(matches!(job.run().await, Err(OntomatchError::InvalidState(_))));
        assert!(!job.is_running());
    }

    #[tokio::test]
    async fn test_schedule_stops_on_shutdown() {
        let store = Arc::new(InMemoryStore::new());
        let job = Arc::new(job_over(store.clone(), store));
        let (tx, rx) = watch::channel(false);
        let handle = CandidateDetectionJob::spawn_schedule(job.clone(), Duration::from_secs(3600), rx);

        while job.last_run().is_none() {
            tokio::task::yield_now().await;
        }
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
