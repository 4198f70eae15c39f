//! Core pipeline logic.
//!
//! This module contains:
//! - ArtifactStore: Per-stage durable checkpoints
//! - SeenSet: The authoritative "fully processed" marker
//! - CostLedger: Append-only record of billable service calls
//! - Pipeline: Prompt construction, response parsing, skip rules
//! - Orchestrator: Batch execution engine

pub mod artifact_store;
pub mod ledger;
pub mod orchestrator;
pub mod pipeline;
pub mod seen_set;

// Re-export commonly used types
pub use artifact_store::ArtifactStore;
pub use ledger::{CostEntry, CostLedger, CostTotals, Period, Price, PriceTable, Usage};
pub use orchestrator::{BatchSummary, Orchestrator, Services};
pub use seen_set::{ProcessingRecord, SeenSet};
