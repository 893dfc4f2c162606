//! Run state and the per-claim branch state.
//!
//! A [`RunState`] is created for each invocation, threaded through every
//! stage, and discarded when the stream completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::claim::{Claim, Evidence, Verdict};

/// Phase of a run.
///
/// Phases only move forward and each is entered at most once:
/// `Init -> Extracting -> Verifying -> Aggregating -> Reporting -> Done`,
/// with `Failed` reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    Extracting,
    /// Fan-out: one branch per claim running concurrently
    Verifying,
    /// Fan-in: merging branch verdicts
    Aggregating,
    Reporting,
    Done,
    Failed,
}

impl RunPhase {
    /// Whether the phase ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// The only phase that may follow this one on success
    fn successor(&self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::Extracting),
            Self::Extracting => Some(Self::Verifying),
            Self::Verifying => Some(Self::Aggregating),
            Self::Aggregating => Some(Self::Reporting),
            Self::Reporting => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }
}

/// Illegal phase change
#[derive(Debug, Clone, Error)]
#[error("Invalid phase transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: RunPhase,
    pub to: RunPhase,
}

/// Order-independent verdict accumulator.
///
/// Each branch contributes its own single-element collection; merging is
/// plain concatenation, so the result does not depend on which branch
/// finishes first beyond list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Verdicts(Vec<Verdict>);

impl Verdicts {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine two partial results
    pub fn merge(mut self, other: Verdicts) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Number of verdicts collected
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Verdict> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Verdict] {
        &self.0
    }
}

impl From<Verdict> for Verdicts {
    fn from(verdict: Verdict) -> Self {
        Self(vec![verdict])
    }
}

/// End-to-end state for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique identifier for this run (logging correlation only)
    pub id: Uuid,

    /// Text being fact-checked
    pub input_text: String,

    /// Claims found by the extractor, priority descending
    pub claims: Vec<Claim>,

    /// Verdicts merged from all branches
    pub verdicts: Verdicts,

    /// Final markdown report
    pub final_report: String,

    /// Run-level error, if the run failed
    pub error: Option<String>,

    /// Current phase
    pub phase: RunPhase,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal phase
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunState {
    /// Create a new run for the given input
    pub fn new(input_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_text: input_text.into(),
            claims: Vec::new(),
            verdicts: Verdicts::new(),
            final_report: String::new(),
            error: None,
            phase: RunPhase::Init,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move to the next phase, rejecting skips, loops, and re-entries
    pub fn advance(&mut self, next: RunPhase) -> Result<(), TransitionError> {
        let allowed = match next {
            RunPhase::Failed => !self.phase.is_terminal(),
            _ => self.phase.successor() == Some(next),
        };

        if !allowed {
            return Err(TransitionError {
                from: self.phase,
                to: next,
            });
        }

        self.phase = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Record a run-level failure
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        if !self.phase.is_terminal() {
            self.phase = RunPhase::Failed;
            self.completed_at = Some(Utc::now());
        }
    }

    /// Fold a branch result into the verdict collection
    pub fn merge_verdicts(&mut self, partial: Verdicts) {
        let current = std::mem::take(&mut self.verdicts);
        self.verdicts = current.merge(partial);
    }

    /// Check if the run finished successfully
    pub fn is_done(&self) -> bool {
        self.phase == RunPhase::Done
    }
}

/// Isolated state for one claim's research and verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchState {
    /// Position in the original claim list
    pub index: usize,

    /// The claim under verification
    pub claim: Claim,

    /// Evidence collected by the researcher
    pub evidence_list: Vec<Evidence>,
}

impl BranchState {
    /// Create a branch for a claim at fan-out time
    pub fn new(index: usize, claim: Claim) -> Self {
        Self {
            index,
            claim,
            evidence_list: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VerdictStatus;

    fn verdict(claim: &str) -> Verdict {
        Verdict {
            claim: claim.to_string(),
            status: VerdictStatus::Supports,
            confidence: 0.9,
            justification: "ok".to_string(),
            evidence_used: Vec::new(),
        }
    }

    #[test]
    fn test_run_creation() {
        let run = RunState::new("test input");
        assert_eq!(run.phase, RunPhase::Init);
        assert_eq!(run.input_text, "test input");
        assert!(run.verdicts.is_empty());
    }

    #[test]
    fn test_full_phase_sequence() {
        let mut run = RunState::new("x");
        for phase in [
            RunPhase::Extracting,
            RunPhase::Verifying,
            RunPhase::Aggregating,
            RunPhase::Reporting,
            RunPhase::Done,
        ] {
            run.advance(phase).unwrap();
        }
        assert!(run.is_done());
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn test_phase_cannot_skip_or_repeat() {
        let mut run = RunState::new("x");
        assert!(run.advance(RunPhase::Verifying).is_err());

        run.advance(RunPhase::Extracting).unwrap();
        assert!(run.advance(RunPhase::Extracting).is_err());
        assert!(run.advance(RunPhase::Init).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut run = RunState::new("x");
        run.advance(RunPhase::Extracting).unwrap();
        run.advance(RunPhase::Failed).unwrap();

        assert!(run.advance(RunPhase::Verifying).is_err());
        assert!(run.advance(RunPhase::Failed).is_err());
    }

    #[test]
    fn test_fail_records_error() {
        let mut run = RunState::new("x");
        run.fail("extraction failed");
        assert_eq!(run.phase, RunPhase::Failed);
        assert_eq!(run.error.as_deref(), Some("extraction failed"));
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = Verdicts::from(verdict("a"));
        let b = Verdicts::from(verdict("b"));
        let c = Verdicts::from(verdict("c"));

        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = c.merge(a).merge(b);

        let mut l: Vec<_> = left.iter().map(|v| v.claim.clone()).collect();
        let mut r: Vec<_> = right.iter().map(|v| v.claim.clone()).collect();
        l.sort();
        r.sort();
        assert_eq!(l, r);
        assert_eq!(l.len(), 3);
    }

    #[test]
    fn test_merge_into_run_state() {
        let mut run = RunState::new("x");
        run.merge_verdicts(Verdicts::from(verdict("a")));
        run.merge_verdicts(Verdicts::from(verdict("b")));
        assert_eq!(run.verdicts.len(), 2);
    }
}
