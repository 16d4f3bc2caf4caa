//! File naming contract: `{job_id}.{audio_ext}` and `{job_id}_cover.{cover_ext}`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::jobs::JobId;

const COVER_SUFFIX: &str = "_cover";

/// Image extensions accepted for cover files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverExt {
    Jpg,
    Jpeg,
    Png,
    Webp,
}

impl CoverExt {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverExt::Jpg => "jpg",
            CoverExt::Jpeg => "jpeg",
            CoverExt::Png => "png",
            CoverExt::Webp => "webp",
        }
    }

    /// Infer the extension from a thumbnail URL
    ///
    /// Takes the text after the final `.` and before any `?`; anything
    /// outside jpg/jpeg/png/webp falls back to `jpg`.
    pub fn infer(thumbnail_url: &str) -> Self {
        thumbnail_url
            .rsplit('.')
            .next()
            .and_then(|tail| tail.split('?').next())
            .and_then(|candidate| candidate.parse().ok())
            .unwrap_or(CoverExt::Jpg)
    }
}

impl FromStr for CoverExt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" => Ok(CoverExt::Jpg),
            "jpeg" => Ok(CoverExt::Jpeg),
            "png" => Ok(CoverExt::Png),
            "webp" => Ok(CoverExt::Webp),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for CoverExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a stored file plays for its job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRole {
    Primary { ext: String },
    Cover { ext: CoverExt },
}

/// A file name decoded into its job identifier and role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredName {
    pub job_id: JobId,
    pub role: FileRole,
}

impl StoredName {
    pub fn primary(job_id: &JobId, audio_ext: &str) -> String {
        format!("{job_id}.{audio_ext}")
    }

    pub fn cover(job_id: &JobId, ext: CoverExt) -> String {
        format!("{job_id}{COVER_SUFFIX}.{ext}")
    }

    /// Decode a file name produced by [`StoredName::primary`] or [`StoredName::cover`]
    ///
    /// Anything else (including path separators) is rejected.
    pub fn parse(file_name: &str, audio_ext: &str) -> Option<Self> {
        let (stem, ext) = file_name.rsplit_once('.')?;

        if let Some(id) = stem.strip_suffix(COVER_SUFFIX) {
            let cover_ext = ext.parse::<CoverExt>().ok()?;
            // Cover names are always written lowercase
            if cover_ext.as_str() != ext {
                return None;
            }
            return Some(Self {
                job_id: JobId::parse(id).ok()?,
                role: FileRole::Cover { ext: cover_ext },
            });
        }

        if ext != audio_ext {
            return None;
        }

        Some(Self {
            job_id: JobId::parse(stem).ok()?,
            role: FileRole::Primary {
                ext: ext.to_string(),
            },
        })
    }

    pub fn file_name(&self) -> String {
        match &self.role {
            FileRole::Primary { ext } => Self::primary(&self.job_id, ext),
            FileRole::Cover { ext } => Self::cover(&self.job_id, *ext),
        }
    }
}
