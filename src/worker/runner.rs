//! Job runner - drives one job from `starting` to a terminal state
//!
//! Checkpoints are fixed milestones, not transfer progress:
//! 0 (spawned) -> 25 (extraction begins) -> 60 (audio produced)
//! -> 85 (cover stored, optional) -> 100 (completed).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::http::CoverClient;
use crate::extractor::{AudioRequest, ExtractError, Extractor};
use crate::jobs::{JobId, JobRegistry, JobStatus, JobUpdate, RegistryError};
use crate::observability::Metrics;
use crate::storage::{CoverExt, FileStore};

pub const PROGRESS_SPAWNED: u8 = 0;
pub const PROGRESS_EXTRACTING: u8 = 25;
pub const PROGRESS_AUDIO_READY: u8 = 60;
pub const PROGRESS_COVER_READY: u8 = 85;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("registry update failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("download cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, TaskError>;

/// Transcode target shared by every job
#[derive(Debug, Clone)]
pub struct AudioSettings {
    pub format: String,
    pub quality: String,
}

/// Everything a worker needs, shared across jobs
pub struct WorkerContext {
    pub registry: Arc<JobRegistry>,
    pub extractor: Arc<dyn Extractor>,
    pub files: Arc<FileStore>,
    pub covers: Arc<CoverClient>,
    pub metrics: Arc<Metrics>,
    pub audio: AudioSettings,
}

/// Run one job to a terminal state; failures are recorded, never propagated
pub async fn process_job(
    ctx: &WorkerContext,
    job_id: &JobId,
    url: &str,
    cancel: &CancellationToken,
) {
    let started = Instant::now();
    info!(%job_id, url, "Starting job");
    ctx.metrics.job_started();

    match run_pipeline(ctx, job_id, url, cancel).await {
        Ok(()) => {
            ctx.metrics.job_completed();
            info!(%job_id, elapsed_ms = started.elapsed().as_millis() as u64, "Job completed");
        }
        Err(e) => {
            ctx.metrics.job_failed();
            error!(%job_id, error = %e, elapsed_ms = started.elapsed().as_millis() as u64, "Job failed");

            if let Err(update_err) = ctx.registry.update(job_id, JobUpdate::failed(e.to_string())) {
                warn!(%job_id, error = %update_err, "Could not record job failure");
            }
        }
    }
}

async fn run_pipeline(
    ctx: &WorkerContext,
    job_id: &JobId,
    url: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    ctx.registry.update(
        job_id,
        JobUpdate::status(JobStatus::Downloading).with_progress(PROGRESS_SPAWNED),
    )?;
    checkpoint(ctx, job_id, cancel)?;

    advance(ctx, job_id, JobUpdate::progress(PROGRESS_EXTRACTING))?;

    let request = AudioRequest {
        url: url.to_string(),
        output_dir: ctx.files.root().to_path_buf(),
        file_stem: job_id.to_string(),
        format: ctx.audio.format.clone(),
        quality: ctx.audio.quality.clone(),
    };

    // Dropping the extraction future aborts the child process
    let metadata = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TaskError::Cancelled),
        result = ctx.extractor.extract_audio(&request) => result?,
    };

    let primary_name = ctx.files.primary_name(job_id);
    advance(
        ctx,
        job_id,
        JobUpdate::progress(PROGRESS_AUDIO_READY)
            .with_title(metadata.title.clone())
            .with_thumbnail_url(metadata.thumbnail_url.clone()),
    )?;
    info!(%job_id, title = %metadata.title, "Audio extracted");
    checkpoint(ctx, job_id, cancel)?;

    let cover = match metadata.thumbnail_url.as_deref() {
        Some(thumbnail_url) => fetch_cover(ctx, job_id, thumbnail_url).await,
        None => None,
    };
    if cover.is_some() {
        advance(ctx, job_id, JobUpdate::progress(PROGRESS_COVER_READY))?;
    }
    checkpoint(ctx, job_id, cancel)?;

    let mut done = JobUpdate::status(JobStatus::Completed)
        .with_primary_path(ctx.files.path_of(&primary_name));
    if let Some((path, ext)) = cover {
        done = done.with_cover(path, ext);
    }
    ctx.registry.update(job_id, done)?;

    Ok(())
}

/// Best-effort cover download; any failure drops the cover and nothing else
async fn fetch_cover(
    ctx: &WorkerContext,
    job_id: &JobId,
    thumbnail_url: &str,
) -> Option<(PathBuf, CoverExt)> {
    let ext = CoverExt::infer(thumbnail_url);
    let name = ctx.files.cover_name(job_id, ext);

    let bytes = match ctx.covers.fetch(thumbnail_url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            ctx.metrics.cover_dropped();
            warn!(%job_id, thumbnail_url, error = %e, "Cover fetch failed, continuing without cover");
            return None;
        }
    };

    match ctx.files.write(&name, bytes).await {
        Ok(path) => {
            info!(%job_id, file = %name, "Cover stored");
            Some((path, ext))
        }
        Err(e) => {
            ctx.metrics.cover_dropped();
            warn!(%job_id, file = %name, error = %e, "Cover write failed, continuing without cover");
            None
        }
    }
}

/// Record a milestone in the registry, then count it
fn advance(ctx: &WorkerContext, job_id: &JobId, update: JobUpdate) -> Result<()> {
    let progress = update.progress;
    ctx.registry.update(job_id, update)?;
    if let Some(progress) = progress {
        ctx.metrics.checkpoint_reached(progress);
    }
    Ok(())
}

/// Stop if the token fired or a client marked the job abandoned
fn checkpoint(ctx: &WorkerContext, job_id: &JobId, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() || ctx.registry.is_abandoned(job_id) {
        return Err(TaskError::Cancelled);
    }
    Ok(())
}
