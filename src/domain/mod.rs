//! Domain types for the verifai pipeline.
//!
//! This module contains the core data structures:
//! - Claim, Evidence, Verdict: records flowing through the pipeline
//! - Events: Lifecycle progress records and the internal stream items
//! - Run: Run state, phase machine, and per-claim branch state

pub mod claim;
pub mod events;
pub mod run;

// Re-export commonly used types
pub use claim::{Claim, Evidence, Verdict, VerdictStatus};
pub use events::{ProgressEvent, StreamItem};
pub use run::{BranchState, RunPhase, RunState, Verdicts};
