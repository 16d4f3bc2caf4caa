//! Extractor backed by the `yt-dlp` executable

use async_trait::async_trait;
use serde::Deserialize;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use super::traits::{ExtractError, Extractor};
use super::types::{AudioRequest, MediaMetadata};
use crate::config::ExtractorConfig;

/// Fields of yt-dlp's info JSON that we consume
#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    thumbnail: Option<String>,
}

/// Runs yt-dlp as a child process per call
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.binary.clone())
    }

    fn metadata_args(url: &str) -> Vec<String> {
        [
            "--ignore-config",
            "--dump-single-json",
            "--skip-download",
            "--no-playlist",
            "--no-warnings",
            "--quiet",
            url,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn audio_args(request: &AudioRequest) -> Vec<String> {
        let template = request
            .output_dir
            .join(format!("{}.%(ext)s", request.file_stem));

        // The sweeper ages files by mtime, so it must be the local write time
        vec![
            "--ignore-config".to_string(),
            "--no-mtime".to_string(),
            "--format".to_string(),
            "bestaudio".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            request.format.clone(),
            "--audio-quality".to_string(),
            request.quality.clone(),
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            "--dump-single-json".to_string(),
            "--no-simulate".to_string(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            request.url.clone(),
        ]
    }

    /// Run the binary to completion; the child is killed if the future is dropped
    async fn run(&self, args: &[String]) -> Result<Output, ExtractError> {
        debug!(binary = %self.binary, ?args, "Running extractor");

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ExtractError::Failed {
                status: output.status.to_string(),
                message: failure_message(&output.stderr),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn fetch_metadata(&self, url: &str) -> Result<MediaMetadata, ExtractError> {
        let output = self.run(&Self::metadata_args(url)).await?;
        parse_info(&output.stdout)
    }

    async fn extract_audio(
        &self,
        request: &AudioRequest,
    ) -> Result<MediaMetadata, ExtractError> {
        let output = self.run(&Self::audio_args(request)).await?;
        let metadata = parse_info(&output.stdout)?;

        let artifact = request.artifact_path();
        if !tokio::fs::try_exists(&artifact).await.unwrap_or(false) {
            return Err(ExtractError::MissingArtifact(artifact));
        }

        Ok(metadata)
    }
}

fn parse_info(stdout: &[u8]) -> Result<MediaMetadata, ExtractError> {
    let text = String::from_utf8_lossy(stdout);
    // The info JSON is the last line printed
    let line = text
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| ExtractError::InvalidOutput("empty output".to_string()))?;

    let info: InfoJson = serde_json::from_str(line.trim())
        .map_err(|e| ExtractError::InvalidOutput(e.to_string()))?;

    Ok(MediaMetadata::new(info.title, info.thumbnail))
}

fn failure_message(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| "no diagnostic output".to_string())
}
