//! File store for extracted audio and cover images
//! Uses the object_store crate over a local download directory

mod naming;

pub use naming::{CoverExt, FileRole, StoredName};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use object_store::{ObjectStore, local::LocalFileSystem, path::Path as StoragePath};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::jobs::JobId;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// A file found under the store root
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// An open stored file, read chunk by chunk
pub struct StoredStream {
    pub size: u64,
    pub chunks: BoxStream<'static, Result<Bytes>>,
}

/// Flat download directory; existence on disk is the only source of truth
#[derive(Clone)]
pub struct FileStore {
    store: Arc<dyn ObjectStore>,
    root: PathBuf,
    audio_ext: String,
}

impl FileStore {
    /// Open (creating if needed) the directory at `root`
    pub fn open(root: impl AsRef<Path>, audio_ext: impl Into<String>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let root = root.canonicalize()?;

        let store = LocalFileSystem::new_with_prefix(&root)?;
        tracing::info!(root = %root.display(), "Opened file store");

        Ok(Self {
            store: Arc::new(store),
            root,
            audio_ext: audio_ext.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn audio_ext(&self) -> &str {
        &self.audio_ext
    }

    /// `{job_id}.{audio_ext}`
    pub fn primary_name(&self, job_id: &JobId) -> String {
        StoredName::primary(job_id, &self.audio_ext)
    }

    /// `{job_id}_cover.{ext}`
    pub fn cover_name(&self, job_id: &JobId, ext: CoverExt) -> String {
        StoredName::cover(job_id, ext)
    }

    /// Decode a client-supplied file name; foreign names are rejected
    pub fn parse_name(&self, file_name: &str) -> Option<StoredName> {
        StoredName::parse(file_name, &self.audio_ext)
    }

    /// Absolute path of a stored file
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Write bytes under `name`, replacing any previous file
    pub async fn write(&self, name: &str, data: Bytes) -> Result<PathBuf> {
        let location = StoragePath::from(name);
        let size = data.len();

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| StorageError::WriteFailed(format!("{name}: {e}")))?;

        tracing::debug!(name, size, "Wrote file to store");
        Ok(self.path_of(name))
    }

    /// Open `name` for streaming; the file is never buffered whole
    pub async fn read_stream(&self, name: &str) -> Result<StoredStream> {
        let location = StoragePath::from(name);

        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let size = result.meta.size;
        tracing::debug!(name, size, "Streaming file from store");

        Ok(StoredStream {
            size,
            chunks: result
                .into_stream()
                .map(|chunk| chunk.map_err(StorageError::from))
                .boxed(),
        })
    }

    /// Check on disk whether `name` currently exists
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let location = StoragePath::from(name);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let location = StoragePath::from(name);

        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stream every regular file under the root; entry errors are yielded, not fatal
    pub fn list(&self) -> BoxStream<'_, Result<StoredFile>> {
        self.store
            .list(None)
            .map(|item| {
                item.map(|meta| StoredFile {
                    name: meta.location.to_string(),
                    last_modified: meta.last_modified,
                    size: meta.size,
                })
                .map_err(StorageError::from)
            })
            .boxed()
    }
}
