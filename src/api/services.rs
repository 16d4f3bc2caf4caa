use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{info, warn};

use super::{
    models::{
        CancelResponse, CoverQuery, HealthResponse, MetadataRequest, MetadataResponse,
        RetrievalQuery, StartDownloadRequest, StartDownloadResponse,
    },
    state::AppState,
    utils::attachment,
    validation::{
        validate_cover_ext, validate_file_name, validate_source_url, validate_track_id,
    },
};
use crate::api::error::ApiError;
use crate::extractor::lookup_metadata;
use crate::jobs::{JobId, JobState, JobStatus, ProgressReport};
use crate::storage::{CoverExt, FileStore};
use crate::worker::{StartOutcome, WaitError};

/// Metadata fast path (POST /download)
///
/// Validates the URL, asks the extractor for title and thumbnail without
/// writing anything, and mints the `track_id` the client will download under.
/// Extraction failures come back as `200` with `success: false`.
pub async fn fetch_metadata(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: MetadataRequest = serde_json::from_slice(&body)?;
    let url = validate_source_url(&request.url, &state.config.extractor.allowed_hosts)?;

    let lookup = lookup_metadata(&**state.extractor(), url.as_str()).await;
    if !lookup.success {
        return Ok(Json(MetadataResponse {
            success: false,
            track_id: None,
            title: None,
            cover_url: None,
            cover_ext: None,
            original_url: None,
            error: lookup.error,
        }));
    }

    Ok(Json(MetadataResponse {
        success: true,
        track_id: Some(JobId::generate().to_string()),
        title: lookup.title,
        cover_url: lookup.thumbnail_url,
        cover_ext: lookup.cover_ext,
        original_url: Some(url.to_string()),
        error: None,
    }))
}

/// Accept a download and return immediately (POST /start_download)
pub async fn start_download(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: StartDownloadRequest = serde_json::from_slice(&body)?;
    let url = validate_source_url(&request.url, &state.config.extractor.allowed_hosts)?;
    let job_id = validate_track_id(&request.track_id)?;

    let outcome = state.runner.start(job_id.clone(), url.to_string());
    info!(%job_id, ?outcome, "Download requested");

    Ok(Json(StartDownloadResponse {
        success: true,
        track_id: job_id.to_string(),
        spawned: outcome == StartOutcome::Spawned,
    }))
}

/// Progress poll (GET /download_progress/{track_id})
///
/// Always a well-formed report: malformed and unknown identifiers both read
/// as `not_found`.
pub async fn download_progress(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> Json<ProgressReport> {
    let report = match validate_track_id(&track_id) {
        Ok(job_id) => state.runner.report(&job_id).await,
        Err(_) => ProgressReport::not_found(),
    };
    Json(report)
}

/// Abandon an in-flight job (DELETE /download/{track_id})
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = validate_track_id(&track_id)?;
    let cancelled = state
        .runner
        .cancel(&job_id)
        .map_err(|e| ApiError::NotFound(e.to_string()))?;

    Ok(Json(CancelResponse {
        track_id: job_id.to_string(),
        cancelled,
    }))
}

/// Serve the audio file (GET /download_mp3/{track_id}?url=)
pub async fn download_primary(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    Query(query): Query<RetrievalQuery>,
) -> Result<Response, ApiError> {
    let job_id = validate_track_id(&track_id)?;
    retrieve(&state, &job_id, Artifact::Primary, query.url.as_deref()).await
}

/// Serve the cover image (GET /download_cover/{track_id}?url=&cover_ext=)
pub async fn download_cover(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    Query(query): Query<CoverQuery>,
) -> Result<Response, ApiError> {
    let job_id = validate_track_id(&track_id)?;
    let ext = query
        .cover_ext
        .as_deref()
        .filter(|ext| !ext.is_empty())
        .map(validate_cover_ext)
        .transpose()?;

    retrieve(&state, &job_id, Artifact::Cover(ext), query.url.as_deref()).await
}

/// Serve any stored file by name (GET /download_file/{filename})
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let name = validate_file_name(state.files(), &filename)
        .map_err(|e| ApiError::NotFound(e.to_string()))?
        .file_name();

    serve(state.files(), &name).await
}

/// Health check endpoint (GET /health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tracked_jobs: state.registry().len(),
        metrics: state.metrics().snapshot(),
    };

    (StatusCode::OK, Json(response))
}

#[derive(Debug, Clone, Copy)]
enum Artifact {
    Primary,
    /// Cover with an extension named by the client, if any
    Cover(Option<CoverExt>),
}

impl Artifact {
    /// Stored names to try, in order, from the request and what the job recorded
    ///
    /// A requested cover extension comes first; the job's own extension
    /// follows when it differs.
    fn names(&self, files: &FileStore, job_id: &JobId, job: Option<&JobState>) -> Vec<String> {
        let recorded = job.and_then(|job| job.cover_ext);
        match self {
            Artifact::Primary => vec![files.primary_name(job_id)],
            Artifact::Cover(Some(ext)) => std::iter::once(*ext)
                .chain(recorded.filter(|recorded| recorded != ext))
                .map(|ext| files.cover_name(job_id, ext))
                .collect(),
            Artifact::Cover(None) => recorded
                .map(|ext| files.cover_name(job_id, ext))
                .into_iter()
                .collect(),
        }
    }

    /// First candidate present on disk
    async fn find(
        &self,
        files: &FileStore,
        job_id: &JobId,
        job: Option<&JobState>,
    ) -> Result<Option<String>, ApiError> {
        for name in self.names(files, job_id, job) {
            if files.exists(&name).await? {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }
}

/// Serve an artifact, re-running its job once if the file is gone
///
/// An existing file is served as-is, a cover under the job's recorded
/// extension included. A job still in flight yields `202`, a failed one
/// `500`. Otherwise, when the client supplied the source URL, the
/// job is started (or joined, if another request already started it) and the
/// handler waits for it within the configured budget.
async fn retrieve(
    state: &AppState,
    job_id: &JobId,
    artifact: Artifact,
    url: Option<&str>,
) -> Result<Response, ApiError> {
    let files = state.files();
    let job = state.registry().get(job_id);

    if let Some(name) = artifact.find(files, job_id, job.as_ref()).await? {
        return serve(files, &name).await;
    }

    if let Some(job) = &job {
        match job.status {
            JobStatus::Starting | JobStatus::Downloading => {
                return Err(ApiError::InProgress(job_id.to_string()));
            }
            JobStatus::Error => {
                return Err(ApiError::DownloadFailed(
                    job.error.clone().unwrap_or_default(),
                ));
            }
            JobStatus::Completed => {
                if matches!(artifact, Artifact::Cover(_)) && job.cover_ext.is_none() {
                    return Err(ApiError::NotFound(format!("no cover for {job_id}")));
                }
            }
        }
    }

    let Some(url) = url.filter(|url| !url.trim().is_empty()) else {
        return Err(ApiError::NotFound(format!("no file for {job_id}")));
    };
    let url = validate_source_url(url, &state.config.extractor.allowed_hosts)?;

    warn!(%job_id, "Artifact missing, running job before serving");
    state.runner.start(job_id.clone(), url.to_string());

    let budget = state.config.download.wait_budget.as_duration();
    let finished = match state.runner.wait_for_terminal(job_id, budget).await {
        Ok(finished) => finished,
        Err(WaitError::Timeout(id)) => return Err(ApiError::Timeout(id)),
        Err(e) => return Err(ApiError::NotFound(e.to_string())),
    };

    if finished.status == JobStatus::Error {
        return Err(ApiError::DownloadFailed(
            finished.error.unwrap_or_default(),
        ));
    }

    match artifact.find(files, job_id, Some(&finished)).await? {
        Some(name) => serve(files, &name).await,
        None => Err(ApiError::NotFound(format!("no file for {job_id}"))),
    }
}

async fn serve(files: &FileStore, name: &str) -> Result<Response, ApiError> {
    let file = files.read_stream(name).await?;
    attachment(name, file)
}
