//! Error taxonomy for the pipeline.
//!
//! Errors are caught at item granularity inside the orchestrator and never
//! escape to abort the whole batch.

use thiserror::Error;

use super::artifact::Stage;
use super::identity::{IdentityError, ItemIdentity};

/// Per-item pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Identity could not be resolved; the item is skipped and logged
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A stage failed (service error, timeout, malformed response).
    /// Remaining stages for the item are skipped; the last good artifact
    /// is preserved so a later run resumes from it.
    #[error("stage {stage} failed for {identity}: {cause}")]
    Stage {
        stage: Stage,
        identity: ItemIdentity,
        #[source]
        cause: anyhow::Error,
    },

    /// Seen-set or ledger write failed. Fatal for the current item: the
    /// orchestrator must not silently proceed to mark it done.
    #[error("store write failed for {identity}: {cause}")]
    Store {
        identity: ItemIdentity,
        #[source]
        cause: anyhow::Error,
    },
}

impl PipelineError {
    /// Build a stage error from any underlying cause
    pub fn stage(stage: Stage, identity: &ItemIdentity, cause: impl Into<anyhow::Error>) -> Self {
        Self::Stage {
            stage,
            identity: identity.clone(),
            cause: cause.into(),
        }
    }

    /// Build a store error
    pub fn store(identity: &ItemIdentity, cause: impl Into<anyhow::Error>) -> Self {
        Self::Store {
            identity: identity.clone(),
            cause: cause.into(),
        }
    }

    /// The stage this error is attributed to, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
