use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::storage::CoverExt;

const UNKNOWN_TITLE: &str = "Unknown Track";

/// Title and artwork resolved for a source URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: String,
    pub thumbnail_url: Option<String>,
}

impl MediaMetadata {
    pub fn new(title: Option<String>, thumbnail_url: Option<String>) -> Self {
        Self {
            title: title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            thumbnail_url: thumbnail_url.filter(|url| !url.is_empty()),
        }
    }

    /// Extension the cover file will be stored under, if there is a thumbnail
    pub fn cover_ext(&self) -> Option<CoverExt> {
        self.thumbnail_url.as_deref().map(CoverExt::infer)
    }
}

/// Download and transcode instructions for one job
#[derive(Debug, Clone)]
pub struct AudioRequest {
    pub url: String,
    /// Directory the artifact is written into
    pub output_dir: PathBuf,
    /// File name without extension (the job id)
    pub file_stem: String,
    /// Target format; also the artifact's extension
    pub format: String,
    pub quality: String,
}

impl AudioRequest {
    /// Where the finished artifact is expected to land
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.file_stem, self.format))
    }
}

/// Structured outcome of the metadata-only fast path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataLookup {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_ext: Option<CoverExt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetadataLookup {
    pub fn found(metadata: MediaMetadata) -> Self {
        Self {
            success: true,
            cover_ext: metadata.cover_ext(),
            title: Some(metadata.title),
            thumbnail_url: metadata.thumbnail_url,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            title: None,
            thumbnail_url: None,
            cover_ext: None,
            error: Some(error.into()),
        }
    }
}
