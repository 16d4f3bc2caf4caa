//! Configuration management for audiobox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use audiobox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `AUDIOBOX__<section>__<key>`
//!
//! Examples:
//! - `AUDIOBOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `AUDIOBOX__STORAGE__DOWNLOAD_DIR=/srv/downloads`
//! - `AUDIOBOX__RETENTION__MAX_AGE=2h`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/audiobox.toml`.
//! This can be overridden using the `AUDIOBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    Config, CoverConfig, DownloadConfig, ExtractorConfig, RetentionConfig, ServerConfig,
    StorageConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`AUDIOBOX__*`)
    /// 2. TOML file (default: `config/audiobox.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[storage]\ndownload_dir = \"media\"\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.storage.download_dir, std::path::PathBuf::from("media"));
    }

    #[test]
    fn test_validation_catches_zero_retention() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[retention]\nmax_age = \"0s\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ZeroDuration { .. })
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"

[storage]
download_dir = "data/downloads"

[extractor]
binary = "yt-dlp"
audio_format = "mp3"
audio_quality = "192K"
allowed_hosts = []

[cover]
timeout = "10s"

[retention]
max_age = "1h"
sweep_interval = "30m"
job_ttl = "2h"

[download]
wait_budget = "30s"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert!(config.extractor.allowed_hosts.is_empty());
        assert_eq!(config.extractor.audio_quality, "192K");
        assert_eq!(config.retention.sweep_interval.as_duration(), Duration::from_secs(1800));
        assert_eq!(config.retention.job_ttl.as_duration(), Duration::from_secs(7200));
    }
}
