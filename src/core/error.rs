//! Run-level errors.
//!
//! Only failures that abort a run live here. Per-query and per-branch
//! failures are absorbed where they happen and never reach this type.

use thiserror::Error;

use super::limits::LimitViolation;
use crate::domain::run::TransitionError;

/// Errors that move a run to FAILED
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Claim extraction failed: {0}")]
    Extraction(String),

    #[error("Report generation failed: {0}")]
    Report(String),

    #[error(transparent)]
    Limit(#[from] LimitViolation),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl PipelineError {
    /// Wrap a collaborator error from the extraction stage
    pub fn extraction(err: anyhow::Error) -> Self {
        Self::Extraction(format!("{:#}", err))
    }

    /// Wrap a collaborator error from the report stage
    pub fn report(err: anyhow::Error) -> Self {
        Self::Report(format!("{:#}", err))
    }
}
