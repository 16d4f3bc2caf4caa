use thiserror::Error;
use url::Url;

use crate::jobs::JobId;
use crate::storage::{CoverExt, FileStore, StoredName};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("url is required")]
    MissingUrl,
    #[error("url '{0}' is not a valid absolute URL")]
    InvalidUrl(String),
    #[error("url scheme '{0}' is not supported, use http or https")]
    UnsupportedScheme(String),
    #[error("host '{0}' is not allowed")]
    HostNotAllowed(String),
    #[error("track_id '{0}' is invalid")]
    InvalidTrackId(String),
    #[error("cover_ext '{0}' is not one of jpg, jpeg, png, webp")]
    InvalidCoverExt(String),
    #[error("file name '{0}' does not name a stored file")]
    InvalidFileName(String),
}

/// Check that `raw` is an http(s) URL on one of `allowed_hosts`
///
/// A host matches when equal to an allowed host or a subdomain of it. An
/// empty allow-list accepts any host.
pub fn validate_source_url(
    raw: &str,
    allowed_hosts: &[String],
) -> Result<Url, RequestValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RequestValidationError::MissingUrl);
    }

    let url = Url::parse(raw).map_err(|_| RequestValidationError::InvalidUrl(raw.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(RequestValidationError::UnsupportedScheme(
            url.scheme().to_string(),
        ));
    }

    let host = url
        .host_str()
        .ok_or_else(|| RequestValidationError::InvalidUrl(raw.to_string()))?
        .to_ascii_lowercase();

    if !allowed_hosts.is_empty() && !allowed_hosts.iter().any(|allowed| host_matches(&host, allowed)) {
        return Err(RequestValidationError::HostNotAllowed(host));
    }

    Ok(url)
}

fn host_matches(host: &str, allowed: &str) -> bool {
    let allowed = allowed.trim().to_ascii_lowercase();
    host == allowed
        || host
            .strip_suffix(allowed.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

pub fn validate_track_id(raw: &str) -> Result<JobId, RequestValidationError> {
    JobId::parse(raw).map_err(|_| RequestValidationError::InvalidTrackId(raw.to_string()))
}

pub fn validate_cover_ext(raw: &str) -> Result<CoverExt, RequestValidationError> {
    raw.parse()
        .map_err(|_| RequestValidationError::InvalidCoverExt(raw.to_string()))
}

/// Accept only names produced by the store's naming contract
pub fn validate_file_name(
    files: &FileStore,
    raw: &str,
) -> Result<StoredName, RequestValidationError> {
    files
        .parse_name(raw)
        .ok_or_else(|| RequestValidationError::InvalidFileName(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn soundcloud() -> Vec<String> {
        vec!["soundcloud.com".to_string()]
    }

    #[test]
    fn accepts_allowed_host_and_subdomain() {
        assert!(validate_source_url("https://soundcloud.com/artist/track", &soundcloud()).is_ok());
        assert!(validate_source_url("https://m.soundcloud.com/artist/track", &soundcloud()).is_ok());
        assert!(validate_source_url("  http://SoundCloud.com/a/b  ", &soundcloud()).is_ok());
    }

    #[test]
    fn rejects_lookalike_and_foreign_hosts() {
        assert_eq!(
            validate_source_url("https://evilsoundcloud.com/a", &soundcloud()),
            Err(RequestValidationError::HostNotAllowed("evilsoundcloud.com".to_string()))
        );
        assert!(matches!(
            validate_source_url("https://example.com/a", &soundcloud()),
            Err(RequestValidationError::HostNotAllowed(_))
        ));
    }

    #[test]
    fn empty_allow_list_accepts_any_http_host() {
        assert!(validate_source_url("https://example.com/a", &[]).is_ok());
    }

    #[test]
    fn rejects_missing_malformed_and_non_http() {
        assert_eq!(
            validate_source_url("   ", &soundcloud()),
            Err(RequestValidationError::MissingUrl)
        );
        assert!(matches!(
            validate_source_url("not a url", &soundcloud()),
            Err(RequestValidationError::InvalidUrl(_))
        ));
        assert_eq!(
            validate_source_url("ftp://soundcloud.com/a", &soundcloud()),
            Err(RequestValidationError::UnsupportedScheme("ftp".to_string()))
        );
    }

    #[test]
    fn track_id_and_cover_ext() {
        assert!(validate_track_id("a1b2c3d4e5f6").is_ok());
        assert!(validate_track_id("../etc/passwd").is_err());
        assert_eq!(validate_cover_ext("PNG"), Ok(CoverExt::Png));
        assert!(validate_cover_ext("gif").is_err());
    }

    #[test]
    fn file_names_follow_the_store_contract() {
        let dir = TempDir::new().unwrap();
        let files = FileStore::open(dir.path(), "mp3").unwrap();

        assert!(validate_file_name(&files, "abc.mp3").is_ok());
        assert!(validate_file_name(&files, "abc_cover.webp").is_ok());
        assert!(validate_file_name(&files, "../abc.mp3").is_err());
        assert!(validate_file_name(&files, "abc.wav").is_err());
    }
}
