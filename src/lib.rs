//! verifai - Claim-level parallel fact-checking pipeline
//!
//! Extracts check-worthy claims from text, researches and judges each claim
//! in its own concurrent branch, and streams a markdown report back while
//! reporting progress as it goes.
//!
//! # Architecture
//!
//! A run moves through fixed phases:
//! - Extract claims, highest priority first
//! - Fan out one research-then-verify branch per claim
//! - Fold every branch verdict into the run (a failed branch still yields one)
//! - Stream the final report
//!
//! Lifecycle events and report tokens share one channel, so clients see them
//! in the order they happened.
//!
//! # Modules
//!
//! - `adapters`: Language model and search capabilities (OpenAI, Tavily, scripted doubles)
//! - `core`: Stages, orchestration, presets, limits, stream records
//! - `domain`: Data structures (Claim, Evidence, Verdict, RunState, events)
//! - `config`: Settings from environment and config file
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Check text, streaming NDJSON records
//! verifai check "The Eiffel Tower was built in 1889." --mode fast
//!
//! # Render the report as text
//! cat article.txt | verifai check --format text
//!
//! # Show the presets
//! verifai modes
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use config::Settings;
pub use crate::core::{Mode, Orchestrator, RunStream, StreamRecord};
pub use domain::{Claim, Evidence, RunState, Verdict, VerdictStatus};
