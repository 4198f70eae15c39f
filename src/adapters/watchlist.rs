//! Watch-list source for ad-hoc video URLs.
//!
//! Reads URLs from a flat text file (blank lines and `#` comments ignored)
//! and resolves each to a candidate item by asking yt-dlp for metadata.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::warn;

use crate::domain::{CandidateItem, MediaReference, SourceKind, SourceMetadata};

use super::MediaSource;

const METADATA_TIMEOUT: Duration = Duration::from_secs(60);

/// Video watch list backed by a text file
pub struct VideoWatchList {
    /// Path to the watch-list file
    path: PathBuf,

    /// Path to the yt-dlp binary (default: "yt-dlp")
    ytdlp_path: String,

    /// Static tags applied to every watch-list item
    static_tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VideoMetadata {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
}

impl VideoWatchList {
    /// Create a watch list over the given file
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ytdlp_path: "yt-dlp".to_string(),
            static_tags: vec!["YouTube".to_string(), "video".to_string()],
        }
    }

    /// Override the yt-dlp binary path
    pub fn with_ytdlp_path(mut self, path: impl Into<String>) -> Self {
        self.ytdlp_path = path.into();
        self
    }

    /// Read URLs, skipping blank lines and comments
    pub async fn read_urls(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read watch list: {}", self.path.display()))?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect())
    }

    /// Resolve one URL to (metadata, media reference) via `yt-dlp --dump-json`
    pub async fn resolve(&self, url: &str) -> Result<CandidateItem> {
        let child = Command::new(&self.ytdlp_path)
            .args(["--dump-json", "--skip-download"])
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn yt-dlp for {}", url))?;

        let output = timeout(METADATA_TIMEOUT, child.wait_with_output())
            .await
            .with_context(|| format!("yt-dlp metadata timed out: {}", url))?
            .context("Failed to wait for yt-dlp process")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp metadata failed for {}: {}", url, stderr.trim());
        }

        let metadata: VideoMetadata =
            serde_json::from_slice(&output.stdout).context("Failed to parse yt-dlp JSON")?;

        Ok(CandidateItem {
            metadata: SourceMetadata {
                kind: SourceKind::Video,
                source_name: metadata.channel.unwrap_or_else(|| "Unknown Channel".to_string()),
                guid: Some(metadata.id),
                link: metadata.webpage_url.or_else(|| Some(url.to_string())),
                title: metadata.title,
                published: metadata.upload_date,
            },
            media: MediaReference::VideoUrl(url.to_string()),
            static_tags: self.static_tags.clone(),
        })
    }
}

#[async_trait]
impl MediaSource for VideoWatchList {
    fn name(&self) -> &str {
        "watchlist"
    }

    async fn candidates(&self) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();

        for url in self.read_urls().await? {
            match self.resolve(&url).await {
                Ok(item) => items.push(item),
                // A dead link must not block the rest of the list
                Err(e) => warn!(url = %url, error = %e, "failed to resolve video metadata"),
            }
        }

        Ok(items)
    }
}
