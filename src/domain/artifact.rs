//! Pipeline stages and the tagged artifacts they produce.
//!
//! Each stage's output is an explicit artifact variant, validated at the
//! next stage's boundary so a malformed upstream result fails fast instead
//! of propagating silently.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One transform step in the pipeline, in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Download the raw media to local storage
    FetchMedia,

    /// Transcribe audio, auto-detecting the spoken language
    Transcribe,

    /// Translate to the target language (pass-through when already there)
    Translate,

    /// Extract chapter titles for long episodes (skipped below threshold)
    ExtractChapters,

    /// Produce the structured summary
    Summarize,

    /// Generate topical tags from the summary
    Tag,

    /// Publish to the knowledge-base sink (terminal stage)
    Publish,
}

impl Stage {
    /// All stages, in execution order
    pub const ORDER: [Stage; 7] = [
        Stage::FetchMedia,
        Stage::Transcribe,
        Stage::Translate,
        Stage::ExtractChapters,
        Stage::Summarize,
        Stage::Tag,
        Stage::Publish,
    ];

    /// File-safe stage name, used as the artifact key
    pub fn name(&self) -> &'static str {
        match self {
            Stage::FetchMedia => "fetch_media",
            Stage::Transcribe => "transcribe",
            Stage::Translate => "translate",
            Stage::ExtractChapters => "extract_chapters",
            Stage::Summarize => "summarize",
            Stage::Tag => "tag",
            Stage::Publish => "publish",
        }
    }

    /// The stage after this one, if any
    pub fn next(&self) -> Option<Stage> {
        let idx = Stage::ORDER.iter().position(|s| s == self)?;
        Stage::ORDER.get(idx + 1).copied()
    }

    /// Whether success of this stage marks the item fully processed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Publish)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Durable output of one stage, persisted keyed by (identity, stage).
///
/// Skipped stages still persist their pass-through variant so the resume
/// logic only ever has to look for the next missing artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageArtifact {
    /// Local media file produced by fetch
    Media {
        path: PathBuf,
        duration_minutes: Option<f64>,
    },

    /// Transcript with the detected language
    Transcript {
        text: String,
        language: String,
        duration_minutes: Option<f64>,
    },

    /// Target-language text (identical to the transcript when translation
    /// was a pass-through)
    Translation { text: String },

    /// Chapter titles; empty when the episode was below the threshold
    Chapters { titles: Vec<String> },

    /// Structured summary document
    Summary { text: String },

    /// AI-derived tags
    TagSet { tags: Vec<String> },

    /// Reference to the published sink page
    Published { page_ref: String },
}

impl StageArtifact {
    /// The stage that produces this artifact
    pub fn stage(&self) -> Stage {
        match self {
            StageArtifact::Media { .. } => Stage::FetchMedia,
            StageArtifact::Transcript { .. } => Stage::Transcribe,
            StageArtifact::Translation { .. } => Stage::Translate,
            StageArtifact::Chapters { .. } => Stage::ExtractChapters,
            StageArtifact::Summary { .. } => Stage::Summarize,
            StageArtifact::TagSet { .. } => Stage::Tag,
            StageArtifact::Published { .. } => Stage::Publish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_next() {
        assert_eq!(Stage::FetchMedia.next(), Some(Stage::Transcribe));
        assert_eq!(Stage::Tag.next(), Some(Stage::Publish));
        assert_eq!(Stage::Publish.next(), None);
        assert!(Stage::Publish.is_terminal());
        assert!(!Stage::Summarize.is_terminal());
    }

    #[test]
    fn test_artifact_reports_producing_stage() {
        let artifact = StageArtifact::Transcript {
            text: "hello".to_string(),
            language: "en".to_string(),
            duration_minutes: Some(12.5),
        };
        assert_eq!(artifact.stage(), Stage::Transcribe);
    }

    #[test]
    fn test_artifact_serialization_round_trip() {
        let artifact = StageArtifact::Chapters {
            titles: vec!["Intro".to_string(), "Closing Thoughts".to_string()],
        };

        let json = serde_json::to_string(&artifact).unwrap();
        assert!(json.contains("\"kind\":\"chapters\""));

        let parsed: StageArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.stage(), Stage::ExtractChapters);
    }
}
