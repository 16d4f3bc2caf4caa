use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub cover: CoverConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

/// File store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

/// Media extractor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Path or name of the yt-dlp executable
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Target transcode format, also the primary file extension
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
    /// Hosts accepted for submission; empty accepts any http/https host
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            allowed_hosts: default_allowed_hosts(),
        }
    }
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> String {
    "128K".to_string()
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["soundcloud.com".to_string()]
}

/// Cover image fetch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoverConfig {
    #[serde(default = "default_cover_timeout")]
    pub timeout: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            timeout: default_cover_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_cover_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("audiobox/{}", env!("CARGO_PKG_VERSION"))
}

/// Retention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Files older than this are deleted by the sweeper
    #[serde(default = "default_hour")]
    pub max_age: HumanDuration,
    #[serde(default = "default_hour")]
    pub sweep_interval: HumanDuration,
    /// Terminal registry entries idle longer than this are evicted
    #[serde(default = "default_hour")]
    pub job_ttl: HumanDuration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: default_hour(),
            sweep_interval: default_hour(),
            job_ttl: default_hour(),
        }
    }
}

fn default_hour() -> HumanDuration {
    HumanDuration::from_secs(60 * 60)
}

/// File retrieval configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// How long a retrieval request waits on an in-flight job before timing out
    #[serde(default = "default_wait_budget")]
    pub wait_budget: HumanDuration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            wait_budget: default_wait_budget(),
        }
    }
}

fn default_wait_budget() -> HumanDuration {
    HumanDuration::from_secs(30)
}
