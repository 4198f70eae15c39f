//! Durable seen-set: the single authoritative "fully done" marker.
//!
//! A JSON map from identity to processing record. Absence means "not yet
//! fully processed". Records are written only after the terminal stage
//! (publish) succeeds, so a partially completed item is never skipped by
//! a later run.
//!
//! Mutations are read-modify-write under an exclusive file lock because
//! overlapping invocations (e.g. two cron ticks) may update the set
//! concurrently.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::domain::{ItemIdentity, SourceKind, Stage};

/// Seen-set entry for one fully processed item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRecord {
    /// Item identity
    pub identity: ItemIdentity,

    /// When the item was first marked processed
    pub first_seen: DateTime<Utc>,

    /// Where the item came from
    pub source_type: SourceKind,

    /// Last completed stage (always the terminal stage on a full run)
    pub last_stage_completed: Stage,
}

impl ProcessingRecord {
    /// Record for an item that just completed the terminal stage
    pub fn completed(identity: ItemIdentity, source_type: SourceKind) -> Self {
        Self {
            identity,
            first_seen: Utc::now(),
            source_type,
            last_stage_completed: Stage::Publish,
        }
    }
}

/// File-backed seen-set store
pub struct SeenSet {
    /// Path to seen.json
    path: PathBuf,
}

impl SeenSet {
    /// Create a seen-set over the given file path
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Check whether an item has fully completed a prior run
    pub fn is_processed(&self, identity: &ItemIdentity) -> Result<bool> {
        Ok(self.snapshot()?.contains_key(identity.as_str()))
    }

    /// Mark an item fully processed.
    ///
    /// Only ever called after the terminal stage succeeds. The whole
    /// read-modify-write happens under an exclusive lock so a concurrent
    /// invocation cannot lose the update.
    pub fn mark_processed(&self, record: ProcessingRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create seen-set directory: {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open seen-set: {}", self.path.display()))?;

        file.lock_exclusive()
            .context("Failed to acquire file lock on seen-set")?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read seen-set")?;

        let mut records: HashMap<String, ProcessingRecord> = if content.trim().is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(&content).context("Failed to parse seen-set JSON")?
        };

        records.insert(record.identity.as_str().to_string(), record);

        let json = serde_json::to_string_pretty(&records).context("Failed to serialize seen-set")?;
        file.set_len(0).context("Failed to truncate seen-set")?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(json.as_bytes())
            .context("Failed to write seen-set")?;
        file.flush().context("Failed to flush seen-set")?;

        Ok(())
    }

    /// Full snapshot of the set, keyed by identity string.
    ///
    /// Reads under a shared lock: the writer truncates the file in place,
    /// so an unlocked read could observe an empty or half-written set.
    pub fn snapshot(&self) -> Result<HashMap<String, ProcessingRecord>> {
        let mut file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to open seen-set: {}", self.path.display())
                })
            }
        };

        file.lock_shared()
            .context("Failed to acquire read lock on seen-set")?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read seen-set")?;

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&content).context("Failed to parse seen-set JSON")
    }

    /// Records sorted by first-seen time, most recent first
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<ProcessingRecord>> {
        let mut records: Vec<_> = self.snapshot()?.into_values().collect();
        records.sort_by(|a, b| b.first_seen.cmp(&a.first_seen));

        if let Some(limit) = limit {
            records.truncate(limit);
        }

        Ok(records)
    }
}
