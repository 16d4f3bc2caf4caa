//! Request and response bodies for the HTTP boundary.
//!
//! The client flow is:
//! - `POST /download` with `{url}` resolves metadata and mints a `track_id`
//! - `POST /start_download` with `{url, track_id}` spawns the background job
//! - `GET /download_progress/{track_id}` is polled until a terminal status
//! - `GET /download_mp3/{track_id}` and `GET /download_cover/{track_id}` serve the files
//!
//! Progress polls return [`crate::jobs::ProgressReport`] directly.

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;
use crate::storage::CoverExt;

#[derive(Debug, Deserialize, Clone)]
pub struct MetadataRequest {
    #[serde(default)]
    pub url: String,
}

/// Result of the metadata fast path
///
/// Extraction failures are reported with `success: false` and an `error`,
/// never as an HTTP error.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MetadataResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_ext: Option<CoverExt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StartDownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub track_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StartDownloadResponse {
    pub success: bool,
    pub track_id: String,
    /// False when the identifier was already in flight and no new job was spawned
    pub spawned: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CancelResponse {
    pub track_id: String,
    pub cancelled: bool,
}

/// `?url=` on the audio retrieval endpoint
#[derive(Debug, Deserialize, Default)]
pub struct RetrievalQuery {
    pub url: Option<String>,
}

/// `?url=&cover_ext=` on the cover retrieval endpoint
#[derive(Debug, Deserialize, Default)]
pub struct CoverQuery {
    pub url: Option<String>,
    pub cover_ext: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub tracked_jobs: usize,
    pub metrics: MetricsSnapshot,
}
