//! Durable store for per-stage artifacts.
//!
//! Each artifact is persisted as JSON keyed by (identity, stage) the moment
//! its stage succeeds. On a retried run the orchestrator loads whatever is
//! already here and resumes from the first missing stage, so a crash between
//! stages never discards completed (and potentially costly) work. Artifacts
//! are retained indefinitely as an audit trail.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::fs;

use crate::domain::{ItemIdentity, Stage, StageArtifact};
use crate::sidecar::MetadataSidecar;

/// File-based artifact store, one directory per identity
pub struct ArtifactStore {
    /// Root directory (e.g. `$PODFLOW_HOME/artifacts`)
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at the given directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Directory holding one item's artifacts
    fn item_dir(&self, identity: &ItemIdentity) -> PathBuf {
        // Identities contain ':' which is not filename-safe everywhere
        self.root.join(identity.as_str().replace(':', "-"))
    }

    fn artifact_path(&self, identity: &ItemIdentity, stage: Stage) -> PathBuf {
        self.item_dir(identity).join(format!("{}.json", stage.name()))
    }

    /// Persist a stage's artifact. Must be called before the next stage
    /// begins; this write is the stage's commit point.
    pub async fn store(&self, identity: &ItemIdentity, artifact: &StageArtifact) -> Result<()> {
        let dir = self.item_dir(identity);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create artifact directory: {}", dir.display()))?;

        let path = self.artifact_path(identity, artifact.stage());
        let json = serde_json::to_string_pretty(artifact).context("Failed to serialize artifact")?;

        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write artifact: {}", path.display()))?;

        Ok(())
    }

    /// Load one stage's artifact, if it was ever persisted
    pub async fn load(&self, identity: &ItemIdentity, stage: Stage) -> Result<Option<StageArtifact>> {
        let path = self.artifact_path(identity, stage);

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read artifact: {}", path.display()))?;

        let artifact: StageArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact: {}", path.display()))?;

        Ok(Some(artifact))
    }

    /// Load all persisted artifacts for an item, in stage order
    pub async fn load_all(&self, identity: &ItemIdentity) -> Result<BTreeMap<Stage, StageArtifact>> {
        let mut artifacts = BTreeMap::new();

        for stage in Stage::ORDER {
            if let Some(artifact) = self.load(identity, stage).await? {
                artifacts.insert(stage, artifact);
            }
        }

        Ok(artifacts)
    }

    /// The latest stage with a persisted artifact
    pub async fn latest_stage(&self, identity: &ItemIdentity) -> Result<Option<Stage>> {
        let mut latest = None;

        for stage in Stage::ORDER {
            if self.artifact_path(identity, stage).exists() {
                latest = Some(stage);
            }
        }

        Ok(latest)
    }

    /// Persist the per-item metadata sidecar. Superseded (not duplicated)
    /// on reprocessing.
    pub async fn store_sidecar(&self, identity: &ItemIdentity, sidecar: &MetadataSidecar) -> Result<()> {
        let dir = self.item_dir(identity);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create artifact directory: {}", dir.display()))?;

        let path = dir.join("sidecar.json");
        let json = serde_json::to_string_pretty(sidecar).context("Failed to serialize sidecar")?;

        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write sidecar: {}", path.display()))?;

        Ok(())
    }

    /// Load the metadata sidecar, if present
    pub async fn load_sidecar(&self, identity: &ItemIdentity) -> Result<Option<MetadataSidecar>> {
        let path = self.item_dir(identity).join("sidecar.json");

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read sidecar: {}", path.display()))?;

        Ok(Some(
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse sidecar: {}", path.display()))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SourceKind, SourceMetadata};
    use tempfile::TempDir;

    fn test_identity() -> ItemIdentity {
        ItemIdentity::resolve(&SourceMetadata {
            kind: SourceKind::Feed,
            source_name: "Test".to_string(),
            guid: Some("ep-1".to_string()),
            link: None,
            title: None,
            published: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_store_and_load_artifact() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().to_path_buf());
        let id = test_identity();

        let artifact = StageArtifact::Transcript {
            text: "hello world".to_string(),
            language: "en".to_string(),
            duration_minutes: Some(30.0),
        };
        store.store(&id, &artifact).await.unwrap();

        let loaded = store.load(&id, Stage::Transcribe).await.unwrap().unwrap();
        assert!(matches!(loaded, StageArtifact::Transcript { ref language, .. } if language == "en"));

        assert!(store.load(&id, Stage::Summarize).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_stage_tracks_progress() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().to_path_buf());
        let id = test_identity();

        assert_eq!(store.latest_stage(&id).await.unwrap(), None);

        store
            .store(&id, &StageArtifact::Media { path: "/tmp/a.mp3".into(), duration_minutes: None })
            .await
            .unwrap();
        assert_eq!(store.latest_stage(&id).await.unwrap(), Some(Stage::FetchMedia));

        store
            .store(
                &id,
                &StageArtifact::Transcript {
                    text: "t".to_string(),
                    language: "de".to_string(),
                    duration_minutes: Some(60.0),
                },
            )
            .await
            .unwrap();
        assert_eq!(store.latest_stage(&id).await.unwrap(), Some(Stage::Transcribe));
    }

    #[tokio::test]
    async fn test_load_all_returns_stage_order() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().to_path_buf());
        let id = test_identity();

        store
            .store(&id, &StageArtifact::Summary { text: "s".to_string() })
            .await
            .unwrap();
        store
            .store(&id, &StageArtifact::Media { path: "/tmp/a.mp3".into(), duration_minutes: None })
            .await
            .unwrap();

        let all = store.load_all(&id).await.unwrap();
        let stages: Vec<_> = all.keys().copied().collect();
        assert_eq!(stages, vec![Stage::FetchMedia, Stage::Summarize]);
    }

    #[tokio::test]
    async fn test_sidecar_is_superseded_not_duplicated() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().to_path_buf());
        let id = test_identity();

        let first = MetadataSidecar {
            source: "Test".to_string(),
            title: "Episode".to_string(),
            published: Some("2025-08-21".to_string()),
            link: None,
            tags: vec!["podcast".to_string()],
        };
        store.store_sidecar(&id, &first).await.unwrap();

        let second = MetadataSidecar {
            tags: vec!["podcast".to_string(), "ai".to_string()],
            ..first.clone()
        };
        store.store_sidecar(&id, &second).await.unwrap();

        let loaded = store.load_sidecar(&id).await.unwrap().unwrap();
        assert_eq!(loaded.tags.len(), 2);
    }
}
