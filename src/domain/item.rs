//! Candidate items and their source metadata.
//!
//! A candidate item is what a media source (RSS feed, watch list) hands to
//! the orchestrator: provenance metadata plus a reference to the raw media.

use serde::{Deserialize, Serialize};

/// Where a content item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Podcast episode from an RSS feed
    Feed,

    /// Ad-hoc video from a platform URL
    Video,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Feed => write!(f, "feed"),
            SourceKind::Video => write!(f, "video"),
        }
    }
}

/// Provenance metadata for one content item.
///
/// The identity resolver derives a stable key from these fields, so the
/// source-native token (`guid` for feeds, platform video ID for videos)
/// should be filled in whenever the source provides one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Source type discriminator
    pub kind: SourceKind,

    /// Feed name or platform/channel name
    pub source_name: String,

    /// Source-native unique token (episode GUID or video ID)
    pub guid: Option<String>,

    /// Canonical URL of the item
    pub link: Option<String>,

    /// Item title
    pub title: Option<String>,

    /// Published date as reported by the source (not yet normalized)
    pub published: Option<String>,
}

impl SourceMetadata {
    /// Title for display, falling back to a placeholder
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }
}

/// Reference to raw media, resolved by the fetch stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaReference {
    /// Direct audio enclosure URL (podcast MP3)
    AudioUrl(String),

    /// Platform video URL, downloaded via yt-dlp
    VideoUrl(String),
}

/// One item a media source offers for processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Provenance metadata
    pub metadata: SourceMetadata,

    /// Where to fetch the raw media from
    pub media: MediaReference,

    /// Static tags configured for the source (merged with AI tags later)
    #[serde(default)]
    pub static_tags: Vec<String>,
}

/// Slugify a string for use in artifact file names.
///
/// Replaces runs of characters outside `[A-Za-z0-9._-]` with `_`, trims
/// leading/trailing underscores, and caps the length at 120 characters.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_sep = false;

    for c in s.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }

    let trimmed = out.trim_matches('_');
    trimmed.chars().take(120).collect()
}

impl CandidateItem {
    /// Base name used for human-readable artifact files
    pub fn slug(&self) -> String {
        format!(
            "{}__{}",
            slugify(&self.metadata.source_name),
            slugify(self.metadata.display_title())
        )
    }
}
