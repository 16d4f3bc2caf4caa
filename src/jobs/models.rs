//! Job state model: identifiers, the status state machine, partial updates
//! and the report handed to pollers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::CoverExt;

const JOB_ID_LEN: usize = 12;
const MAX_JOB_ID_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid job id '{0}': expected 1-64 ASCII letters, digits, '-' or '_'")]
pub struct InvalidJobId(pub String);

/// Opaque job identifier; also the stem of every file a job produces
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Mint a fresh short identifier
    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(JOB_ID_LEN);
        Self(id)
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidJobId> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw.len() <= MAX_JOB_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidJobId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = InvalidJobId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JobId> for String {
    fn from(value: JobId) -> Self {
        value.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    Downloading,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Allowed edges: starting -> downloading -> completed, starting|downloading -> error
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, next),
            (Starting, Downloading)
                | (Starting, Error)
                | (Downloading, Downloading)
                | (Downloading, Completed)
                | (Downloading, Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Downloading => "downloading",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative in-memory state of one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobState {
    pub status: JobStatus,
    pub progress: u8,
    pub title: Option<String>,
    pub error: Option<String>,
    pub thumbnail_url: Option<String>,
    pub primary_path: Option<PathBuf>,
    pub cover_path: Option<PathBuf>,
    pub cover_ext: Option<CoverExt>,
    /// Set when the client gave up on the job
    pub abandoned: bool,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl JobState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            status: JobStatus::Starting,
            progress: 0,
            title: None,
            error: None,
            thumbnail_url: None,
            primary_path: None,
            cover_path: None,
            cover_ext: None,
            abandoned: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether `update` is a legal step from the current state
    pub fn check(&self, update: &JobUpdate) -> Result<(), (JobStatus, JobStatus)> {
        let next = update.status.unwrap_or(self.status);

        if self.status.is_terminal() {
            return Err((self.status, next));
        }

        if next != self.status && !self.status.can_transition_to(next) {
            return Err((self.status, next));
        }

        Ok(())
    }

    /// Apply a checked update, normalising progress for the resulting status
    pub(crate) fn apply(&mut self, update: JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(title) = update.title {
            self.title = Some(title);
        }
        if let Some(thumbnail_url) = update.thumbnail_url {
            self.thumbnail_url = Some(thumbnail_url);
        }
        if let Some(primary_path) = update.primary_path {
            self.primary_path = Some(primary_path);
        }
        if let Some(cover_path) = update.cover_path {
            self.cover_path = Some(cover_path);
        }
        if let Some(cover_ext) = update.cover_ext {
            self.cover_ext = Some(cover_ext);
        }

        match self.status {
            JobStatus::Completed => {
                self.progress = 100;
                self.error = None;
            }
            JobStatus::Error => {
                self.progress = 0;
                self.error = Some(
                    update
                        .error
                        .filter(|message| !message.is_empty())
                        .unwrap_or_else(|| "unknown error".to_string()),
                );
            }
            JobStatus::Starting | JobStatus::Downloading => {
                if let Some(progress) = update.progress {
                    // Never moves backwards while in flight
                    self.progress = self.progress.max(progress.min(100));
                }
            }
        }

        self.updated_at = Utc::now();
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub title: Option<String>,
    pub error: Option<String>,
    pub thumbnail_url: Option<String>,
    pub primary_path: Option<PathBuf>,
    pub cover_path: Option<PathBuf>,
    pub cover_ext: Option<CoverExt>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_thumbnail_url(mut self, thumbnail_url: Option<String>) -> Self {
        self.thumbnail_url = thumbnail_url;
        self
    }

    pub fn with_primary_path(mut self, path: PathBuf) -> Self {
        self.primary_path = Some(path);
        self
    }

    pub fn with_cover(mut self, path: PathBuf, ext: CoverExt) -> Self {
        self.cover_path = Some(path);
        self.cover_ext = Some(ext);
        self
    }
}

/// Status as reported to pollers; adds `not_found` for unknown identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Starting,
    Downloading,
    Completed,
    Error,
    NotFound,
}

impl From<JobStatus> for ReportStatus {
    fn from(value: JobStatus) -> Self {
        match value {
            JobStatus::Starting => ReportStatus::Starting,
            JobStatus::Downloading => ReportStatus::Downloading,
            JobStatus::Completed => ReportStatus::Completed,
            JobStatus::Error => ReportStatus::Error,
        }
    }
}

/// Poll response; availability flags come from the file store at read time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub status: ReportStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_ext: Option<CoverExt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_available: Option<bool>,
}

impl ProgressReport {
    pub fn not_found() -> Self {
        Self {
            status: ReportStatus::NotFound,
            progress: 0,
            title: None,
            error: None,
            thumbnail_url: None,
            cover_ext: None,
            primary_available: None,
            cover_available: None,
        }
    }

    pub fn from_state(state: &JobState) -> Self {
        Self {
            status: state.status.into(),
            progress: state.progress,
            title: state.title.clone(),
            error: state.error.clone(),
            thumbnail_url: state.thumbnail_url.clone(),
            cover_ext: state.cover_ext,
            primary_available: None,
            cover_available: None,
        }
    }
}
