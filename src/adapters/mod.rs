//! Adapter interfaces for external collaborators.
//!
//! The core pipeline only ever talks to feed fetchers, AI services, and the
//! publishing sink through these narrow contracts, so every collaborator is
//! replaceable (and mockable in tests). Each call carries a bounded timeout;
//! a timed-out call surfaces as an ordinary error and becomes a stage
//! failure, never a hang.

pub mod claude;
pub mod feed;
pub mod fetch;
pub mod notion;
pub mod watchlist;
pub mod whisper;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateItem, ItemIdentity, MediaReference};
use crate::sidecar::MetadataSidecar;

pub use claude::ClaudeService;
pub use feed::RssFeedSource;
pub use fetch::Downloader;
pub use notion::NotionSink;
pub use watchlist::VideoWatchList;
pub use whisper::WhisperTranscriber;

/// Yields candidate items for one batch (RSS feeds, watch lists, ...)
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Current candidates, newest first per source
    async fn candidates(&self) -> Result<Vec<CandidateItem>>;
}

/// Raw media fetched to local storage
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    /// Local path of the downloaded audio
    pub path: PathBuf,

    /// Duration in minutes, when the fetcher knows it
    pub duration_minutes: Option<f64>,
}

/// Downloads raw media referenced by a candidate item
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        media: &MediaReference,
        dest_dir: &Path,
        base_name: &str,
        timeout: Duration,
    ) -> Result<FetchedMedia>;
}

/// Output of one transcription call
#[derive(Debug, Clone)]
pub struct TranscriptOutput {
    /// Full transcript text
    pub text: String,

    /// Detected language code (e.g. "en", "de"), "unknown" if undetected
    pub language: String,

    /// Audio duration in minutes, if reported
    pub duration_minutes: Option<f64>,
}

/// Speech-to-text service
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Service name used for cost attribution
    fn name(&self) -> &str;

    async fn transcribe(&self, audio: &Path, timeout: Duration) -> Result<TranscriptOutput>;
}

/// Response plus the usage actually billed by the call
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Model output text
    pub text: String,

    /// Billed input tokens
    pub input_tokens: u64,

    /// Billed output tokens
    pub output_tokens: u64,
}

/// Text-completion service (translation, summarization, chapters, tags)
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Service name used for cost attribution (the model identifier)
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, max_tokens: u32, timeout: Duration) -> Result<LlmResponse>;
}

/// Structured document handed to the publishing sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkDocument {
    /// Per-item metadata (canonical date, tag union, provenance)
    pub sidecar: MetadataSidecar,

    /// Summary body
    pub summary: String,

    /// Chapter titles (empty for short episodes)
    pub chapters: Vec<String>,
}

/// Knowledge-base publishing sink.
#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Sink name for logging
    fn name(&self) -> &str;

    /// Create or update the page for an identity and return its reference.
    ///
    /// Must be idempotent: calling twice for the same identity updates the
    /// existing page rather than duplicating it. The orchestrator relies on
    /// this to make the publish stage retry-safe.
    async fn upsert(
        &self,
        identity: &ItemIdentity,
        document: &SinkDocument,
        timeout: Duration,
    ) -> Result<String>;
}
