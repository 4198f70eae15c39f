//! Stable, collision-resistant item identities.
//!
//! Two invocations that see the same underlying content must produce the
//! same identity, and distinct items must never collide. The key is derived
//! from the source discriminator plus the most specific source-native token
//! available: episode GUID, video ID, canonical link, or a title+date
//! composite as a last resort.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::item::{SourceKind, SourceMetadata};

/// Raised when no sufficiently unique token can be derived.
///
/// Aborts processing of the single item, never the batch.
#[derive(Debug, Error)]
#[error("could not resolve identity for '{source_name}': {reason}")]
pub struct IdentityError {
    /// Source name of the offending item
    pub source_name: String,

    /// Why resolution failed
    pub reason: String,
}

/// Stable identifier for one content item across runs.
///
/// Format: `{kind}:{sha256(source_name\n token)[0:16]}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemIdentity(String);

impl ItemIdentity {
    /// Derive the identity for an item. Pure and deterministic.
    pub fn resolve(metadata: &SourceMetadata) -> Result<Self, IdentityError> {
        let token = Self::native_token(metadata).ok_or_else(|| IdentityError {
            source_name: metadata.source_name.clone(),
            reason: "no GUID, link, or title+date token available".to_string(),
        })?;

        let mut hasher = Sha256::new();
        hasher.update(metadata.source_name.as_bytes());
        hasher.update(b"\n");
        hasher.update(token.as_bytes());
        let digest = hasher.finalize();

        Ok(Self(format!(
            "{}:{}",
            metadata.kind,
            hex::encode(&digest[..8])
        )))
    }

    /// Pick the most specific token the source provides
    fn native_token(metadata: &SourceMetadata) -> Option<String> {
        if let Some(guid) = non_empty(&metadata.guid) {
            return Some(format!("guid:{guid}"));
        }
        if let Some(link) = non_empty(&metadata.link) {
            return Some(format!("link:{link}"));
        }
        // Title alone is too weak (reruns, renamed episodes); require a date
        match (non_empty(&metadata.title), non_empty(&metadata.published)) {
            (Some(title), Some(published)) => Some(format!("title:{title}@{published}")),
            _ => None,
        }
    }

    /// The raw string key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The source kind prefix of the key
    pub fn kind(&self) -> Option<SourceKind> {
        match self.0.split(':').next() {
            Some("feed") => Some(SourceKind::Feed),
            Some("video") => Some(SourceKind::Video),
            _ => None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl std::fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
