//! HTTP client for fetching cover images

use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::CoverConfig;

#[derive(Debug, Error)]
pub enum CoverError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {0}")]
    BadStatus(u16),

    #[error("Empty response body")]
    Empty,
}

pub type Result<T> = std::result::Result<T, CoverError>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            user_agent: format!("audiobox/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&CoverConfig> for HttpConfig {
    fn from(config: &CoverConfig) -> Self {
        Self {
            request_timeout: config.timeout.as_duration(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Single-shot cover downloader; the whole request is bounded by the timeout
pub struct CoverClient {
    client: Client,
}

impl CoverClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| CoverError::RequestFailed(e.to_string()))?;

        Ok(Self { client })
    }

    /// Fetch the image at `url`
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        debug!(url, "Fetching cover");

        let response = self.client.get(url).send().await.map_err(map_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoverError::BadStatus(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(map_error)?;
        if bytes.is_empty() {
            return Err(CoverError::Empty);
        }

        debug!(url, size = bytes.len(), "Cover fetched");
        Ok(bytes)
    }
}

fn map_error(e: reqwest::Error) -> CoverError {
    if e.is_timeout() {
        CoverError::Timeout
    } else {
        CoverError::RequestFailed(e.to_string())
    }
}
