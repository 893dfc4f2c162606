//! Core orchestration logic.
//!
//! This module contains:
//! - Presets: Workflow modes and their tuning
//! - Limits: Admission limits for a run
//! - Stages: Extractor, Researcher, Verifier, Report generator
//! - Branch: The per-claim sub-workflow
//! - Orchestrator: Phase machine, fan-out and fan-in
//! - Stream: NDJSON records handed to clients

pub mod branch;
pub mod context;
pub mod error;
pub mod extractor;
pub mod limits;
pub mod orchestrator;
pub mod presets;
pub mod report;
pub mod researcher;
pub mod stream;
pub mod verifier;

// Re-export commonly used types
pub use context::{EventSink, PipelineContext};
pub use error::PipelineError;
pub use limits::{LimitViolation, RunLimits};
pub use orchestrator::Orchestrator;
pub use presets::{all_presets, preset, Mode, PresetViolation, SearchDepth, WorkflowConfig};
pub use stream::{RunStream, StreamRecord};
