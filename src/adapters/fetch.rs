//! Media downloader: direct HTTP for podcast enclosures, yt-dlp for videos.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::domain::MediaReference;

use super::{FetchedMedia, MediaFetcher};

/// Concrete fetcher for both media reference kinds
pub struct Downloader {
    /// HTTP client for direct enclosure downloads
    client: reqwest::Client,

    /// Path to the yt-dlp binary (default: "yt-dlp")
    ytdlp_path: String,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    /// Create a downloader with default binary paths
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            ytdlp_path: "yt-dlp".to_string(),
        }
    }

    /// Override the yt-dlp binary path
    pub fn with_ytdlp_path(mut self, path: impl Into<String>) -> Self {
        self.ytdlp_path = path.into();
        self
    }

    /// Stream an audio URL to `<dest_dir>/<base_name>.mp3`
    async fn download_audio(
        &self,
        url: &str,
        dest_dir: &Path,
        base_name: &str,
        step_timeout: Duration,
    ) -> Result<FetchedMedia> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .with_context(|| format!("Failed to create audio directory: {}", dest_dir.display()))?;

        let dest = dest_dir.join(format!("{}.mp3", base_name));

        let download = async {
            let mut response = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("Failed to request audio: {}", url))?
                .error_for_status()
                .with_context(|| format!("Audio download rejected: {}", url))?;

            let mut file = tokio::fs::File::create(&dest)
                .await
                .with_context(|| format!("Failed to create audio file: {}", dest.display()))?;

            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<_, anyhow::Error>(())
        };

        timeout(step_timeout, download)
            .await
            .with_context(|| format!("Audio download timed out after {:?}: {}", step_timeout, url))??;

        Ok(FetchedMedia {
            path: dest,
            duration_minutes: None,
        })
    }

    /// Extract audio from a video URL via yt-dlp
    async fn download_video_audio(
        &self,
        url: &str,
        dest_dir: &Path,
        base_name: &str,
        step_timeout: Duration,
    ) -> Result<FetchedMedia> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .with_context(|| format!("Failed to create audio directory: {}", dest_dir.display()))?;

        let dest = dest_dir.join(format!("{}.mp3", base_name));
        let out_template = dest_dir.join(format!("{}.%(ext)s", base_name));

        let child = Command::new(&self.ytdlp_path)
            .args(["-x", "--audio-format", "mp3", "-o"])
            .arg(&out_template)
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn yt-dlp for {}", url))?;

        let output = timeout(step_timeout, child.wait_with_output())
            .await
            .with_context(|| format!("yt-dlp timed out after {:?}: {}", step_timeout, url))?
            .context("Failed to wait for yt-dlp process")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "yt-dlp failed with exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(FetchedMedia {
            path: dest,
            duration_minutes: None,
        })
    }
}

#[async_trait]
impl MediaFetcher for Downloader {
    async fn fetch(
        &self,
        media: &MediaReference,
        dest_dir: &Path,
        base_name: &str,
        timeout: Duration,
    ) -> Result<FetchedMedia> {
        match media {
            MediaReference::AudioUrl(url) => {
                self.download_audio(url, dest_dir, base_name, timeout).await
            }
            MediaReference::VideoUrl(url) => {
                self.download_video_audio(url, dest_dir, base_name, timeout).await
            }
        }
    }
}
