//! Evidence research for a single claim.
//!
//! Asks the model for search queries, runs each query against the search
//! provider, and flattens the hits into evidence in query order, then
//! result order. A failing query is skipped; the others still run.

use anyhow::Result;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::context::PipelineContext;
use crate::adapters::{generate_as, OutputSchema};
use crate::domain::events::names;
use crate::domain::{BranchState, Evidence, ProgressEvent};

/// Schema name for query generation output
pub const QUERIES_SCHEMA: &str = "search_queries";

#[derive(Debug, Deserialize)]
struct SearchQueries {
    #[serde(default)]
    queries: Vec<String>,
}

fn queries_schema(max_queries: usize) -> OutputSchema {
    OutputSchema {
        name: QUERIES_SCHEMA,
        schema: json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "maxItems": max_queries,
                    "description": "Web search queries that would confirm or refute the claim"
                }
            },
            "required": ["queries"]
        }),
    }
}

fn build_prompt(claim_text: &str, max_queries: usize) -> String {
    format!(
        "You write web search queries for fact-checkers.\n\
         Write up to {} distinct queries that would surface sources able to confirm \
         or refute the claim below. Prefer specific names, dates and figures from the \
         claim over generic wording.\n\
         \n\
         Claim: {}",
        max_queries, claim_text
    )
}

/// Clean up model-proposed queries: trim, drop blanks, cap the count, and
/// fall back to the claim itself when nothing usable is left
pub fn select_queries(proposed: Vec<String>, claim_text: &str, max_queries: usize) -> Vec<String> {
    let mut queries: Vec<String> = proposed
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(max_queries.max(1))
        .collect();

    if queries.is_empty() {
        queries.push(claim_text.trim().to_string());
    }
    queries
}

/// Research evidence for the branch's claim, filling `branch.evidence_list`
pub async fn research_evidence(ctx: &PipelineContext, branch: &mut BranchState) -> Result<()> {
    let index = branch.index;
    let config = ctx.config;

    ctx.sink
        .emit(ProgressEvent::with_payload(
            names::research_start(index),
            &json!({ "claim_index": index }),
        ))
        .await;

    let request = ctx.request(build_prompt(&branch.claim.text, config.max_queries_per_claim));
    let proposed: SearchQueries = match generate_as(
        ctx.model.as_ref(),
        &request,
        &queries_schema(config.max_queries_per_claim),
    )
    .await
    {
        Ok(proposed) => proposed,
        Err(e) => {
            // Close the research panel before the branch degrades
            emit_end(ctx, index, &[]).await;
            return Err(e);
        }
    };
    let queries = select_queries(proposed.queries, &branch.claim.text, config.max_queries_per_claim);
    debug!(claim_index = index, ?queries, "Search queries generated");

    ctx.sink
        .emit(ProgressEvent::with_payload(
            names::research_queries(index),
            &json!({ "claim_index": index, "queries": queries }),
        ))
        .await;

    let mut evidence_list: Vec<Evidence> = Vec::new();

    for (query_index, query) in queries.iter().enumerate() {
        let hits = match ctx
            .search
            .search(query, config.max_search_results_per_query, config.search_depth)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(claim_index = index, query_index, error = %e, "Search failed, skipping query");
                ctx.sink
                    .emit(ProgressEvent::with_payload(
                        names::research_query_failed(index),
                        &json!({
                            "claim_index": index,
                            "query_index": query_index,
                            "message": format!("{:#}", e),
                        }),
                    ))
                    .await;
                continue;
            }
        };

        let query_evidence: Vec<Evidence> = hits
            .into_iter()
            .take(config.max_search_results_per_query)
            .map(|hit| {
                Evidence::from_hit(hit.url, &hit.content, hit.score, config.snippet_max_length)
            })
            .collect();

        ctx.sink
            .emit(ProgressEvent::with_payload(
                names::research_results(index),
                &json!({
                    "claim_index": index,
                    "query_index": query_index,
                    "evidences": query_evidence,
                }),
            ))
            .await;

        evidence_list.extend(query_evidence);
    }

    evidence_list.truncate(config.max_evidence_per_claim);
    debug!(claim_index = index, count = evidence_list.len(), "Evidence collected");

    emit_end(ctx, index, &evidence_list).await;

    branch.evidence_list = evidence_list;
    Ok(())
}

async fn emit_end(ctx: &PipelineContext, index: usize, evidence_list: &[Evidence]) {
    ctx.sink
        .emit(ProgressEvent::with_payload(
            names::research_end(index),
            &json!({ "claim_index": index, "evidences": evidence_list }),
        ))
        .await;
}
