use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use super::types::{AudioRequest, MediaMetadata};

/// Extraction errors; transcode failures surface here too
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to launch extractor: {0}")]
    Launch(#[from] std::io::Error),
    #[error("extractor exited with {status}: {message}")]
    Failed { status: String, message: String },
    #[error("unreadable extractor output: {0}")]
    InvalidOutput(String),
    #[error("extractor finished but {0} was not produced")]
    MissingArtifact(PathBuf),
}

/// Resolves source URLs to metadata and performs download + transcode
///
/// Implementations must not spawn background work of their own; callers
/// drive them to completion (or drop the future to abort).
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Resolve title and thumbnail without writing any file
    async fn fetch_metadata(&self, url: &str) -> Result<MediaMetadata, ExtractError>;

    /// Download the audio track and transcode it to `request.artifact_path()`
    async fn extract_audio(
        &self,
        request: &AudioRequest,
    ) -> Result<MediaMetadata, ExtractError>;
}
