//! Retention sweeper
//!
//! Deletes stored files whose age exceeds the configured maximum and evicts
//! terminal job entries that have sat idle past their TTL. Runs once at
//! startup and then on a fixed interval until shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RetentionConfig;
use crate::jobs::JobRegistry;
use crate::observability::Metrics;
use crate::storage::FileStore;

/// Sweep statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub files_scanned: usize,
    pub files_deleted: usize,
    pub errors: usize,
    pub jobs_evicted: usize,
}

pub struct RetentionSweeper {
    files: Arc<FileStore>,
    registry: Arc<JobRegistry>,
    metrics: Arc<Metrics>,
    max_age: Duration,
    job_ttl: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(
        files: Arc<FileStore>,
        registry: Arc<JobRegistry>,
        metrics: Arc<Metrics>,
        config: &RetentionConfig,
    ) -> Self {
        Self {
            files,
            registry,
            metrics,
            max_age: config.max_age.as_duration(),
            job_ttl: config.job_ttl.as_duration(),
            interval: config.sweep_interval.as_duration(),
        }
    }

    /// One pass over the download directory as of `now`
    ///
    /// A file is removed only when strictly older than `max_age`. Failures on
    /// individual files are logged and skipped.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats::default();
        let mut listing = self.files.list();

        while let Some(entry) = listing.next().await {
            let file = match entry {
                Ok(file) => file,
                Err(e) => {
                    stats.errors += 1;
                    self.metrics.sweep_error();
                    warn!(error = %e, "Failed to inspect stored file");
                    continue;
                }
            };
            stats.files_scanned += 1;

            let age = now
                .signed_duration_since(file.last_modified)
                .to_std()
                .unwrap_or_default();
            if age <= self.max_age {
                continue;
            }

            match self.files.delete(&file.name).await {
                Ok(()) => {
                    stats.files_deleted += 1;
                    debug!(file = %file.name, age_secs = age.as_secs(), "Deleted expired file");
                }
                Err(e) => {
                    stats.errors += 1;
                    self.metrics.sweep_error();
                    warn!(file = %file.name, error = %e, "Failed to delete expired file");
                }
            }
        }

        stats.jobs_evicted = self.registry.evict_idle(now, self.job_ttl);
        self.metrics.files_swept(stats.files_deleted as u64);

        info!(
            scanned = stats.files_scanned,
            deleted = stats.files_deleted,
            errors = stats.errors,
            evicted = stats.jobs_evicted,
            "Retention sweep complete"
        );
        stats
    }

    /// Sweep immediately, then every interval until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            max_age_secs = self.max_age.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Retention sweeper started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_once(Utc::now()).await;
                }
            }
        }

        info!("Retention sweeper stopped");
    }
}
