//! Process-local counters for job and retention activity

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::worker::runner::{PROGRESS_AUDIO_READY, PROGRESS_COVER_READY, PROGRESS_EXTRACTING};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_started: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    covers_dropped: AtomicU64,
    reached_extracting: AtomicU64,
    reached_audio_ready: AtomicU64,
    reached_cover_ready: AtomicU64,
    files_swept: AtomicU64,
    sweep_errors: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_started", "Metric incremented");
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_completed", "Metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    pub fn cover_dropped(&self) {
        self.covers_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "covers_dropped", "Metric incremented");
    }

    /// Count a job passing one of the runner's intermediate milestones
    pub fn checkpoint_reached(&self, progress: u8) {
        let counter = match progress {
            PROGRESS_EXTRACTING => &self.reached_extracting,
            PROGRESS_AUDIO_READY => &self.reached_audio_ready,
            PROGRESS_COVER_READY => &self.reached_cover_ready,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn files_swept(&self, count: u64) {
        self.files_swept.fetch_add(count, Ordering::Relaxed);
    }

    pub fn sweep_error(&self) {
        self.sweep_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            covers_dropped: self.covers_dropped.load(Ordering::Relaxed),
            reached_extracting: self.reached_extracting.load(Ordering::Relaxed),
            reached_audio_ready: self.reached_audio_ready.load(Ordering::Relaxed),
            reached_cover_ready: self.reached_cover_ready.load(Ordering::Relaxed),
            files_swept: self.files_swept.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_started: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub covers_dropped: u64,
    pub reached_extracting: u64,
    pub reached_audio_ready: u64,
    pub reached_cover_ready: u64,
    pub files_swept: u64,
    pub sweep_errors: u64,
}
