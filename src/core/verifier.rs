//! Verdict judgment for a single claim.
//!
//! Only the first `evidence_for_verdict` items are shown to the model, each
//! under a numeric id. The model cites ids; ids are mapped back onto that
//! presented subset, so a verdict can never reference evidence it did not see.

use anyhow::Result;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::context::PipelineContext;
use crate::adapters::{generate_as, OutputSchema};
use crate::domain::events::names;
use crate::domain::{BranchState, Evidence, ProgressEvent, Verdict, VerdictStatus};

/// Schema name for verdict output
pub const VERDICT_SCHEMA: &str = "verdict_output";

/// Context text used when research found nothing
pub const NO_EVIDENCE_MARKER: &str = "No evidence found.";

#[derive(Debug, Deserialize)]
struct VerdictOutput {
    status: VerdictStatus,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    justification: String,
    #[serde(default)]
    evidence_ids_used: Vec<i64>,
}

fn verdict_schema() -> OutputSchema {
    OutputSchema {
        name: VERDICT_SCHEMA,
        schema: json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["SUPPORTS", "REFUTES", "NOT_ENOUGH_INFO"]
                },
                "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
                "justification": { "type": "string" },
                "evidence_ids_used": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "description": "Ids of the evidence pieces the verdict relies on"
                }
            },
            "required": ["status", "confidence", "justification", "evidence_ids_used"]
        }),
    }
}

/// Render the presented evidence as numbered context
pub fn format_evidence(evidence: &[Evidence]) -> String {
    if evidence.is_empty() {
        return NO_EVIDENCE_MARKER.to_string();
    }

    evidence
        .iter()
        .enumerate()
        .map(|(i, e)| format!("Id: {}, Source: {}, Snippet: {}", i, e.source, e.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_prompt(claim_text: &str, evidence_context: &str) -> String {
    format!(
        "You are a careful fact-checker. Judge the claim using only the evidence below.\n\
         \n\
         Rules:\n\
         - SUPPORTS only when the evidence explicitly and specifically confirms the claim.\n\
         - REFUTES only when the evidence explicitly contradicts the claim. Not finding \
         confirmation is not a contradiction.\n\
         - NOT_ENOUGH_INFO when the evidence is missing, partial, general, or only \
         tangentially related. When in doubt, choose NOT_ENOUGH_INFO.\n\
         \n\
         Give a confidence between 0 and 1, a short justification, and the ids of the \
         evidence pieces you relied on.\n\
         \n\
         Claim: {}\n\
         \n\
         Evidence:\n{}",
        claim_text, evidence_context
    )
}

/// Map cited ids onto the presented evidence, dropping out-of-range and
/// repeated ids and keeping the presented order
pub fn resolve_citations(presented: &[Evidence], ids: &[i64]) -> Vec<Evidence> {
    let mut cited = vec![false; presented.len()];
    for &id in ids {
        if let Ok(i) = usize::try_from(id) {
            if let Some(slot) = cited.get_mut(i) {
                *slot = true;
            }
        }
    }

    presented
        .iter()
        .zip(cited)
        .filter(|(_, used)| *used)
        .map(|(e, _)| e.clone())
        .collect()
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Judge the branch's claim against its collected evidence
pub async fn verify_evidence(ctx: &PipelineContext, branch: &BranchState) -> Result<Verdict> {
    let index = branch.index;

    ctx.sink
        .emit(ProgressEvent::with_payload(
            names::verify_start(index),
            &json!({ "claim_index": index }),
        ))
        .await;

    let take = ctx.config.evidence_for_verdict.min(branch.evidence_list.len());
    let presented = &branch.evidence_list[..take];

    let request = ctx.request(build_prompt(&branch.claim.text, &format_evidence(presented)));
    let output: VerdictOutput = generate_as(ctx.model.as_ref(), &request, &verdict_schema()).await?;

    let verdict = Verdict {
        claim: branch.claim.text.clone(),
        status: output.status,
        confidence: clamp_confidence(output.confidence),
        justification: output.justification,
        evidence_used: resolve_citations(presented, &output.evidence_ids_used),
    };
    debug!(claim_index = index, status = %verdict.status, confidence = verdict.confidence, "Verdict produced");

    ctx.sink
        .emit(ProgressEvent::with_payload(names::verify_end(index), &verdict))
        .await;

    Ok(verdict)
}
