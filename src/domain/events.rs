//! Lifecycle events emitted while a run executes.
//!
//! Every stage reports progress as a [`ProgressEvent`]. Events for a
//! fan-out branch carry the branch index in their name (and payload) so a
//! client can attribute them to the right claim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::run::RunState;

/// A discrete lifecycle record `{event, payload}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Event name, e.g. `research_evidence_start_2`
    pub event: String,

    /// Structured payload, already in plain JSON form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ProgressEvent {
    /// Create an event without payload
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload: None,
        }
    }

    /// Create an event carrying any serializable payload.
    ///
    /// Nested records and lists are converted recursively; a payload that
    /// cannot be represented as JSON is dropped rather than failing the run.
    pub fn with_payload(event: impl Into<String>, payload: &impl Serialize) -> Self {
        let event = event.into();
        let payload = match serde_json::to_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%event, error = %e, "Dropping unserializable event payload");
                None
            }
        };
        Self { event, payload }
    }

    /// Branch index this event belongs to, if any
    pub fn claim_index(&self) -> Option<usize> {
        self.payload
            .as_ref()
            .and_then(|p| p.get("claim_index"))
            .and_then(Value::as_u64)
            .map(|i| i as usize)
            .or_else(|| {
                self.event
                    .rsplit_once('_')
                    .and_then(|(_, suffix)| suffix.parse().ok())
            })
    }
}

/// Event names used across the pipeline
pub mod names {
    pub const EXTRACT_CLAIMS_START: &str = "extract_claims_start";
    pub const EXTRACT_CLAIMS_END: &str = "extract_claims_end";
    pub const GENERATE_REPORT_START: &str = "generate_report_start";
    pub const GENERATE_REPORT_END: &str = "generate_report_end";

    pub fn research_start(index: usize) -> String {
        format!("research_evidence_start_{}", index)
    }

    pub fn research_queries(index: usize) -> String {
        format!("research_evidence_queries_{}", index)
    }

    pub fn research_results(index: usize) -> String {
        format!("research_evidence_results_{}", index)
    }

    pub fn research_query_failed(index: usize) -> String {
        format!("research_evidence_query_failed_{}", index)
    }

    pub fn research_end(index: usize) -> String {
        format!("research_evidence_end_{}", index)
    }

    pub fn verify_start(index: usize) -> String {
        format!("verify_evidence_start_{}", index)
    }

    pub fn verify_failed(index: usize) -> String {
        format!("verify_evidence_failed_{}", index)
    }

    pub fn verify_end(index: usize) -> String {
        format!("verify_evidence_end_{}", index)
    }
}

/// An item on the internal run channel.
///
/// Lifecycle events and report tokens share one channel so the consumer
/// sees them in true emission order. The last item of a run is always
/// `Completed` or `Failed`.
#[derive(Debug, Clone)]
pub enum StreamItem {
    /// Lifecycle/progress record
    Event(ProgressEvent),

    /// Report text fragment
    Token(String),

    /// Run reached DONE, carrying the final state
    Completed(Box<RunState>),

    /// Run reached FAILED
    Failed(String),
}
