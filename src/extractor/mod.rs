//! Media extraction seam
//!
//! The service never parses media itself: everything about resolving a
//! source URL, downloading it and transcoding the audio is delegated to an
//! [`Extractor`]. The default implementation shells out to `yt-dlp`.
//!
//! ## Key Components
//!
//! - [`Extractor`] - async trait implemented by extraction backends
//! - [`YtDlpExtractor`] - yt-dlp child-process backend
//! - [`MediaMetadata`] / [`AudioRequest`] - inputs and outputs of a backend
//! - [`lookup_metadata`] - metadata-only fast path with a structured result

mod traits;
mod types;
mod ytdlp;

pub use traits::{ExtractError, Extractor};
pub use types::{AudioRequest, MediaMetadata, MetadataLookup};
pub use ytdlp::YtDlpExtractor;

use tracing::{info, warn};

/// Resolve title and cover details for `url` without writing any file
///
/// Failures are folded into the returned [`MetadataLookup`] so callers can
/// render them directly.
pub async fn lookup_metadata(extractor: &dyn Extractor, url: &str) -> MetadataLookup {
    match extractor.fetch_metadata(url).await {
        Ok(metadata) => {
            info!(url, title = %metadata.title, "Fetched metadata");
            MetadataLookup::found(metadata)
        }
        Err(e) => {
            warn!(url, error = %e, "Metadata lookup failed");
            MetadataLookup::failed(e.to_string())
        }
    }
}
