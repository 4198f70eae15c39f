//! Denormalized per-item metadata document.
//!
//! Produced once the summarize and tag stages complete, consumed by the
//! publishing sink and read-only evaluation tooling. Dates are normalized
//! to a single canonical representation; the tag set is the union of the
//! source's static tags and the AI-derived tags.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dates::to_iso_date;
use crate::domain::SourceMetadata;

/// Per-item metadata sidecar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSidecar {
    /// Feed or channel name
    pub source: String,

    /// Episode/video title
    pub title: String,

    /// Canonical `YYYY-MM-DD` date, or the raw value when unparseable
    pub published: Option<String>,

    /// Canonical URL
    pub link: Option<String>,

    /// Union of static source tags and AI-derived tags, deduped and sorted
    pub tags: Vec<String>,
}

impl MetadataSidecar {
    /// Build a sidecar from source metadata and both tag sets
    pub fn build(metadata: &SourceMetadata, static_tags: &[String], ai_tags: &[String]) -> Self {
        let published = metadata.published.as_deref().map(|raw| {
            to_iso_date(raw).unwrap_or_else(|_| {
                warn!(date = raw, "could not normalize published date, keeping raw value");
                raw.to_string()
            })
        });

        Self {
            source: metadata.source_name.clone(),
            title: metadata.display_title().to_string(),
            published,
            link: metadata.link.clone(),
            tags: merge_tags(static_tags, ai_tags),
        }
    }
}

/// Union of two tag sets, trimmed, deduped case-sensitively, sorted
pub fn merge_tags(static_tags: &[String], ai_tags: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = static_tags
        .iter()
        .chain(ai_tags.iter())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    tags.sort();
    tags.dedup();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceKind;

    fn meta(published: Option<&str>) -> SourceMetadata {
        SourceMetadata {
            kind: SourceKind::Feed,
            source_name: "Tech Weekly".to_string(),
            guid: Some("ep-9".to_string()),
            link: Some("https://example.com/ep9".to_string()),
            title: Some("Episode Nine".to_string()),
            published: published.map(String::from),
        }
    }

    #[test]
    fn test_merge_tags_unions_and_sorts() {
        let merged = merge_tags(
            &["podcast".to_string(), "tech".to_string()],
            &["AI coding tools".to_string(), "tech".to_string(), " ".to_string()],
        );
        assert_eq!(merged, vec!["AI coding tools", "podcast", "tech"]);
    }

    #[test]
    fn test_build_normalizes_rfc822_date() {
        let sidecar = MetadataSidecar::build(
            &meta(Some("Thu, 21 Aug 2025 05:00:00 -0000")),
            &["podcast".to_string()],
            &[],
        );
        assert_eq!(sidecar.published.as_deref(), Some("2025-08-21"));
        assert_eq!(sidecar.source, "Tech Weekly");
    }

    #[test]
    fn test_build_keeps_raw_value_when_unparseable() {
        let sidecar = MetadataSidecar::build(&meta(Some("sometime in august")), &[], &[]);
        assert_eq!(sidecar.published.as_deref(), Some("sometime in august"));
    }
}
