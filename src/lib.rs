//! podflow - idempotent podcast and video processing pipeline
//!
//! Watches RSS feeds and a video watch list, and pushes each new item
//! through a fixed stage pipeline: fetch, transcribe, translate (when the
//! episode is not already in English), extract chapters (for long
//! episodes), summarize, tag, publish.
//!
//! # Architecture
//!
//! The system is built around durable checkpoints:
//! - Every stage persists its artifact before the next stage starts
//! - A rerun resumes from the first missing artifact, never repeating paid work
//! - The seen-set marks items fully done only after publish succeeds
//! - Every billable service call is appended to a cost ledger exactly once
//!
//! # Modules
//!
//! - `adapters`: External collaborators (feeds, yt-dlp, whisper, Claude, Notion)
//! - `core`: Stores, cost ledger, prompts, and the batch orchestrator
//! - `domain`: Identities, stages, artifacts, and the error taxonomy
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process all configured sources
//! podflow run
//!
//! # Process one video immediately
//! podflow ingest https://youtube.com/watch?v=...
//!
//! # Cost report for a month
//! podflow costs 2025-08
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod dates;
pub mod domain;
pub mod sidecar;

// Re-export main types at crate root for convenience
pub use self::core::{BatchSummary, CostLedger, Orchestrator, SeenSet, Services};
pub use domain::{CandidateItem, ItemIdentity, PipelineError, Stage, StageArtifact};
pub use sidecar::MetadataSidecar;
