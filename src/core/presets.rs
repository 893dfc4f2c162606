//! Workflow configuration and the named presets.
//!
//! A run selects one preset by [`Mode`] at start. Presets are immutable
//! singletons: the orchestrator only ever holds a `&'static WorkflowConfig`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

static DEFAULT_PRESET: OnceLock<WorkflowConfig> = OnceLock::new();
static FAST_PRESET: OnceLock<WorkflowConfig> = OnceLock::new();
static HIGH_PRESET: OnceLock<WorkflowConfig> = OnceLock::new();

/// Workflow mode selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Balanced cost and accuracy
    #[default]
    Default,

    /// Faster, lower cost
    Fast,

    /// Slower, more thorough
    High,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Default, Mode::Fast, Mode::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Fast => "fast",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search depth, trading latency for result quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }
}

/// Tunable run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Model identifier passed to the language model capability
    pub model_name: String,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum number of search results to retrieve per query
    pub max_search_results_per_query: usize,

    /// Maximum number of search queries to generate per claim
    pub max_queries_per_claim: usize,

    /// Search depth
    pub search_depth: SearchDepth,

    /// Maximum pieces of evidence to collect per claim
    pub max_evidence_per_claim: usize,

    /// Maximum length of evidence snippets (characters)
    pub snippet_max_length: usize,

    /// Number of top evidence pieces presented to the verifier
    pub evidence_for_verdict: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            model_name: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_search_results_per_query: 3,
            max_queries_per_claim: 2,
            search_depth: SearchDepth::Advanced,
            max_evidence_per_claim: 5,
            snippet_max_length: 500,
            evidence_for_verdict: 3,
        }
    }
}

/// Inclusive bounds for the numeric fields
pub mod bounds {
    use std::ops::RangeInclusive;

    pub const TEMPERATURE: RangeInclusive<f32> = 0.0..=2.0;
    pub const MAX_SEARCH_RESULTS_PER_QUERY: RangeInclusive<usize> = 1..=10;
    pub const MAX_QUERIES_PER_CLAIM: RangeInclusive<usize> = 1..=5;
    pub const MAX_EVIDENCE_PER_CLAIM: RangeInclusive<usize> = 1..=20;
    pub const SNIPPET_MAX_LENGTH: RangeInclusive<usize> = 100..=2000;
    pub const EVIDENCE_FOR_VERDICT: RangeInclusive<usize> = 1..=10;
}

/// Preset validation errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PresetViolation {
    #[error("{field} out of bounds: {value} not in [{min}, {max}]")]
    OutOfBounds {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("model_name cannot be empty")]
    EmptyModel,
}

fn check_usize(
    field: &'static str,
    value: usize,
    range: std::ops::RangeInclusive<usize>,
) -> Result<(), PresetViolation> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(PresetViolation::OutOfBounds {
            field,
            value: value as f64,
            min: *range.start() as f64,
            max: *range.end() as f64,
        })
    }
}

impl WorkflowConfig {
    /// Validate every numeric field against its declared bounds
    pub fn validate(&self) -> Result<(), PresetViolation> {
        if self.model_name.trim().is_empty() {
            return Err(PresetViolation::EmptyModel);
        }

        if !bounds::TEMPERATURE.contains(&self.temperature) {
            return Err(PresetViolation::OutOfBounds {
                field: "temperature",
                value: self.temperature as f64,
                min: *bounds::TEMPERATURE.start() as f64,
                max: *bounds::TEMPERATURE.end() as f64,
            });
        }

        check_usize(
            "max_search_results_per_query",
            self.max_search_results_per_query,
            bounds::MAX_SEARCH_RESULTS_PER_QUERY,
        )?;
        check_usize(
            "max_queries_per_claim",
            self.max_queries_per_claim,
            bounds::MAX_QUERIES_PER_CLAIM,
        )?;
        check_usize(
            "max_evidence_per_claim",
            self.max_evidence_per_claim,
            bounds::MAX_EVIDENCE_PER_CLAIM,
        )?;
        check_usize(
            "snippet_max_length",
            self.snippet_max_length,
            bounds::SNIPPET_MAX_LENGTH,
        )?;
        check_usize(
            "evidence_for_verdict",
            self.evidence_for_verdict,
            bounds::EVIDENCE_FOR_VERDICT,
        )?;

        Ok(())
    }
}

/// Get the preset for a mode
pub fn preset(mode: Mode) -> &'static WorkflowConfig {
    match mode {
        Mode::Default => DEFAULT_PRESET.get_or_init(WorkflowConfig::default),
        Mode::Fast => FAST_PRESET.get_or_init(|| WorkflowConfig {
            model_name: "gpt-4o-mini".to_string(),
            max_search_results_per_query: 2,
            max_queries_per_claim: 1,
            max_evidence_per_claim: 3,
            search_depth: SearchDepth::Basic,
            ..WorkflowConfig::default()
        }),
        Mode::High => HIGH_PRESET.get_or_init(|| WorkflowConfig {
            model_name: "gpt-4o".to_string(),
            max_search_results_per_query: 5,
            max_queries_per_claim: 3,
            max_evidence_per_claim: 10,
            ..WorkflowConfig::default()
        }),
    }
}

/// All presets as plain data, keyed by preset name
pub fn all_presets() -> BTreeMap<&'static str, &'static WorkflowConfig> {
    Mode::ALL
        .iter()
        .map(|mode| (mode.as_str(), preset(*mode)))
        .collect()
}
