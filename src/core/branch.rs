//! Per-claim sub-workflow: research, then verify.
//!
//! A branch owns its [`BranchState`] and always yields exactly one verdict.
//! Failures are absorbed here so siblings and the run keep going.

use serde_json::json;
use tracing::{info_span, warn, Instrument};

use super::context::PipelineContext;
use super::researcher::research_evidence;
use super::verifier::verify_evidence;
use crate::domain::events::names;
use crate::domain::{BranchState, ProgressEvent, Verdict, Verdicts};

/// Run one claim branch to completion
pub async fn run_branch(ctx: PipelineContext, mut branch: BranchState) -> Verdicts {
    let span = info_span!("branch", claim_index = branch.index);

    async move {
        let outcome = match research_evidence(&ctx, &mut branch).await {
            Ok(()) => verify_evidence(&ctx, &branch).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(verdict) => Verdicts::from(verdict),
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(error = %message, "Branch failed, recording degraded verdict");

                ctx.sink
                    .emit(ProgressEvent::with_payload(
                        names::verify_failed(branch.index),
                        &json!({ "claim_index": branch.index, "message": message }),
                    ))
                    .await;

                let verdict = Verdict::degraded(branch.claim.text.clone(), &message);
                ctx.sink
                    .emit(ProgressEvent::with_payload(
                        names::verify_end(branch.index),
                        &verdict,
                    ))
                    .await;

                Verdicts::from(verdict)
            }
        }
    }
    .instrument(span)
    .await
}
