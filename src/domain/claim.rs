//! Claims, evidence, and verdicts.
//!
//! These are the records that flow between pipeline stages. They carry no
//! behavior beyond construction helpers that enforce their invariants.

use serde::{Deserialize, Serialize};

/// Priority assigned when the extractor omits one
pub const DEFAULT_PRIORITY: u8 = 5;

/// Relevance score assigned when the search provider omits one
pub const DEFAULT_RELEVANCE: f64 = 0.5;

/// A single check-worthy factual assertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// The claim text
    pub text: String,

    /// Priority level (1-10, higher is more important)
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl Claim {
    /// Create a claim, clamping the priority into 1..=10
    pub fn new(text: impl Into<String>, priority: u8) -> Self {
        Self {
            text: text.into(),
            priority: priority.clamp(1, 10),
        }
    }
}

/// One retrieved snippet for a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Source URL or reference
    pub source: String,

    /// Relevant text snippet (length-capped)
    pub snippet: String,

    /// How relevant this evidence is (0-1)
    pub relevance_score: f64,
}

impl Evidence {
    /// Build evidence from a raw search hit.
    ///
    /// The snippet is cut to `snippet_max_length` characters and a missing
    /// score becomes [`DEFAULT_RELEVANCE`].
    pub fn from_hit(
        source: impl Into<String>,
        content: &str,
        score: Option<f64>,
        snippet_max_length: usize,
    ) -> Self {
        Self {
            source: source.into(),
            snippet: truncate_chars(content, snippet_max_length),
            relevance_score: score.unwrap_or(DEFAULT_RELEVANCE).clamp(0.0, 1.0),
        }
    }
}

/// Cut a string to at most `max` characters without splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Truth status of a claim (FEVER labels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    /// Evidence explicitly confirms the claim
    Supports,

    /// Evidence explicitly contradicts the claim
    Refutes,

    /// Evidence is missing, partial, or tangential
    #[serde(alias = "NOT ENOUGH INFO")]
    NotEnoughInfo,
}

impl VerdictStatus {
    /// Label used in prompts and reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Supports => "SUPPORTS",
            Self::Refutes => "REFUTES",
            Self::NotEnoughInfo => "NOT ENOUGH INFO",
        }
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The judged outcome for one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// The original claim text
    pub claim: String,

    /// Truth status
    pub status: VerdictStatus,

    /// Confidence level (0-1)
    pub confidence: f64,

    /// Explanation for the verdict
    pub justification: String,

    /// Evidence cited by the verdict, in original order
    #[serde(default)]
    pub evidence_used: Vec<Evidence>,
}

impl Verdict {
    /// Placeholder verdict for a claim whose branch failed
    pub fn degraded(claim: impl Into<String>, reason: &str) -> Self {
        Self {
            claim: claim.into(),
            status: VerdictStatus::NotEnoughInfo,
            confidence: 0.0,
            justification: format!("Verification failed: {}", reason),
            evidence_used: Vec::new(),
        }
    }

    /// Confidence rendered as a whole percentage
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}
