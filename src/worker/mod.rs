//! Background job execution
//!
//! [`JobRunner`] owns the shared [`WorkerContext`] and spawns one tokio task
//! per accepted download. A job identifier is executed at most once at a time:
//! late callers await the in-flight job's completion signal instead of
//! starting a second extraction.

pub mod http;
pub mod runner;

pub use runner::{AudioSettings, TaskError, WorkerContext, process_job};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::jobs::{Claim, JobId, JobState, ProgressReport, RegistryError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {0} did not finish in time")]
    Timeout(String),

    #[error("job {0} was evicted while waiting")]
    Evicted(String),
}

/// What [`JobRunner::start`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Spawned,
    AlreadyRunning,
}

pub struct JobRunner {
    ctx: Arc<WorkerContext>,
}

impl JobRunner {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    /// Register the job and spawn its worker unless it is already in flight
    ///
    /// Identifiers whose previous run reached a terminal state are started again.
    pub fn start(&self, job_id: JobId, url: String) -> StartOutcome {
        let cancel = match self.ctx.registry.claim(&job_id) {
            Claim::Created(cancel) => cancel,
            Claim::Live => {
                debug!(%job_id, "Job already in flight, not spawning");
                return StartOutcome::AlreadyRunning;
            }
        };

        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            process_job(&ctx, &job_id, &url, &cancel).await;
        });

        StartOutcome::Spawned
    }

    /// Abandon an in-flight job; `Ok(false)` if it had already finished
    pub fn cancel(&self, job_id: &JobId) -> Result<bool, RegistryError> {
        self.ctx.registry.cancel(job_id)
    }

    /// Wait until the job reaches a terminal state, bounded by `budget`
    pub async fn wait_for_terminal(
        &self,
        job_id: &JobId,
        budget: Duration,
    ) -> Result<JobState, WaitError> {
        let mut rx = self
            .ctx
            .registry
            .subscribe(job_id)
            .ok_or_else(|| WaitError::NotFound(job_id.to_string()))?;

        match tokio::time::timeout(budget, rx.wait_for(|state| state.status.is_terminal())).await {
            Ok(Ok(state)) => Ok(state.clone()),
            Ok(Err(_)) => Err(WaitError::Evicted(job_id.to_string())),
            Err(_) => {
                warn!(%job_id, budget_ms = budget.as_millis() as u64, "Timed out waiting for job");
                Err(WaitError::Timeout(job_id.to_string()))
            }
        }
    }

    /// Poll view of a job; availability is re-checked on disk for completed jobs
    pub async fn report(&self, job_id: &JobId) -> ProgressReport {
        let Some(state) = self.ctx.registry.get(job_id) else {
            return ProgressReport::not_found();
        };

        let mut report = ProgressReport::from_state(&state);

        if state.status == crate::jobs::JobStatus::Completed {
            let files = &self.ctx.files;
            let primary = files.primary_name(job_id);
            report.primary_available = Some(files.exists(&primary).await.unwrap_or(false));

            let cover_available = match state.cover_ext {
                Some(ext) => files
                    .exists(&files.cover_name(job_id, ext))
                    .await
                    .unwrap_or(false),
                None => false,
            };
            report.cover_available = Some(cover_available);
        }

        report
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        let live = self.ctx.registry.len();
        if live > 0 {
            info!(tracked_jobs = live, "Job runner shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{AudioRequest, ExtractError, Extractor, MediaMetadata};
    use crate::jobs::{JobRegistry, JobStatus, ReportStatus};
    use crate::observability::Metrics;
    use crate::storage::FileStore;
    use crate::worker::http::{CoverClient, HttpConfig};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Blocks extraction until released and counts invocations
    struct GatedExtractor {
        calls: AtomicUsize,
        gate: Notify,
    }

    #[async_trait]
    impl Extractor for GatedExtractor {
        async fn fetch_metadata(&self, _url: &str) -> Result<MediaMetadata, ExtractError> {
            Ok(MediaMetadata::new(Some("Gated".to_string()), None))
        }

        async fn extract_audio(&self, request: &AudioRequest) -> Result<MediaMetadata, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            tokio::fs::write(request.artifact_path(), b"ID3").await?;
            Ok(MediaMetadata::new(Some("Gated".to_string()), None))
        }
    }

    fn build_runner(dir: &TempDir) -> (JobRunner, Arc<GatedExtractor>) {
        let extractor = Arc::new(GatedExtractor {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
        });
        let ctx = WorkerContext {
            registry: Arc::new(JobRegistry::new()),
            extractor: extractor.clone(),
            files: Arc::new(FileStore::open(dir.path(), "mp3").unwrap()),
            covers: Arc::new(CoverClient::new(HttpConfig::default()).unwrap()),
            metrics: Arc::new(Metrics::new()),
            audio: AudioSettings {
                format: "mp3".to_string(),
                quality: "128K".to_string(),
            },
        };
        (JobRunner::new(ctx), extractor)
    }

    async fn wait_until_extracting(runner: &JobRunner, job: &JobId) {
        let mut rx = runner.context().registry.subscribe(job).unwrap();
        rx.wait_for(|state| state.progress >= super::runner::PROGRESS_EXTRACTING)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_is_at_most_once_while_in_flight() {
        let dir = TempDir::new().unwrap();
        let (runner, extractor) = build_runner(&dir);
        let job = JobId::parse("once").unwrap();
        let url = "https://soundcloud.com/a/b".to_string();

        assert_eq!(runner.start(job.clone(), url.clone()), StartOutcome::Spawned);
        assert_eq!(runner.start(job.clone(), url.clone()), StartOutcome::AlreadyRunning);

        wait_until_extracting(&runner, &job).await;
        tokio::task::yield_now().await;
        extractor.gate.notify_one();

        let state = runner
            .wait_for_terminal(&job, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(state.status, JobStatus::Completed);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_times_out_on_stuck_job() {
        let dir = TempDir::new().unwrap();
        let (runner, _extractor) = build_runner(&dir);
        let job = JobId::parse("stuck").unwrap();

        runner.start(job.clone(), "https://soundcloud.com/a/b".to_string());

        let err = runner
            .wait_for_terminal(&job, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err, WaitError::Timeout("stuck".to_string()));
    }

    #[tokio::test]
    async fn wait_on_unknown_job_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (runner, _extractor) = build_runner(&dir);

        let err = runner
            .wait_for_terminal(&JobId::parse("ghost").unwrap(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err, WaitError::NotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn cancel_aborts_in_flight_extraction() {
        let dir = TempDir::new().unwrap();
        let (runner, _extractor) = build_runner(&dir);
        let job = JobId::parse("cancelme").unwrap();

        runner.start(job.clone(), "https://soundcloud.com/a/b".to_string());
        wait_until_extracting(&runner, &job).await;

        assert_eq!(runner.cancel(&job), Ok(true));

        let state = runner
            .wait_for_terminal(&job, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(state.status, JobStatus::Error);
        assert_eq!(state.error.as_deref(), Some("download cancelled"));
    }

    #[tokio::test]
    async fn report_rechecks_files_on_disk() {
        let dir = TempDir::new().unwrap();
        let (runner, extractor) = build_runner(&dir);
        let job = JobId::parse("evicted").unwrap();

        runner.start(job.clone(), "https://soundcloud.com/a/b".to_string());
        wait_until_extracting(&runner, &job).await;
        tokio::task::yield_now().await;
        extractor.gate.notify_one();
        runner
            .wait_for_terminal(&job, Duration::from_secs(5))
            .await
            .unwrap();

        let report = runner.report(&job).await;
        assert_eq!(report.status, ReportStatus::Completed);
        assert_eq!(report.primary_available, Some(true));
        assert_eq!(report.cover_available, Some(false));

        std::fs::remove_file(runner.context().files.path_of("evicted.mp3")).unwrap();
        let report = runner.report(&job).await;
        assert_eq!(report.status, ReportStatus::Completed);
        assert_eq!(report.primary_available, Some(false));
    }

    #[tokio::test]
    async fn report_unknown_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (runner, _extractor) = build_runner(&dir);

        let report = runner.report(&JobId::parse("nobody").unwrap()).await;
        assert_eq!(report, ProgressReport::not_found());
    }
}
