//! Domain types for the podflow pipeline.
//!
//! This module contains the core data structures:
//! - Identity: stable per-item keys derived from source metadata
//! - Item: candidate items and their source metadata
//! - Artifact: stage outputs persisted between runs
//! - Error: the pipeline error taxonomy

pub mod artifact;
pub mod error;
pub mod identity;
pub mod item;

// Re-export commonly used types
pub use artifact::{Stage, StageArtifact};
pub use error::PipelineError;
pub use identity::ItemIdentity;
pub use item::{CandidateItem, MediaReference, SourceKind, SourceMetadata};
