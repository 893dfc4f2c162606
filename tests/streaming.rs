//! Streaming Protocol Tests
//!
//! Every run, whatever its outcome, must produce a well-formed NDJSON
//! stream: `start` first, exactly one terminal record last.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::{json, Value};

use verifai::adapters::{ScriptedModel, ScriptedSearch};
use verifai::core::extractor::CLAIMS_SCHEMA;
use verifai::core::researcher::QUERIES_SCHEMA;
use verifai::core::verifier::VERDICT_SCHEMA;
use verifai::core::{Mode, Orchestrator, RunLimits, StreamRecord};

fn single_claim_model() -> ScriptedModel {
    ScriptedModel::new()
        .with_structured(
            CLAIMS_SCHEMA,
            json!({ "claims": [{ "text": "Water boils at 100C at sea level.", "priority": 7 }] }),
        )
        .with_structured(QUERIES_SCHEMA, json!({ "queries": ["water boiling point"] }))
        .with_structured(
            VERDICT_SCHEMA,
            json!({
                "status": "NOT_ENOUGH_INFO",
                "confidence": 0.3,
                "justification": "No sources found.",
                "evidence_ids_used": []
            }),
        )
        .with_text(&["## Report", "\n", "Unverified."])
}

/// Run to completion and return the NDJSON lines
async fn ndjson_lines(orchestrator: Orchestrator, input: &str) -> Vec<String> {
    orchestrator
        .start(input, Mode::Default)
        .map(|record| record.to_ndjson().unwrap())
        .collect()
        .await
}

fn assert_well_formed(lines: &[String]) {
    let values: Vec<Value> = lines
        .iter()
        .map(|line| serde_json::from_str(line).expect("valid JSON line"))
        .collect();

    assert!(values.len() >= 2);
    assert_eq!(values[0]["event"], "start");

    let terminal: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v["event"] == "done" || v["event"] == "error")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(terminal, vec![values.len() - 1]);

    for value in &values[1..values.len() - 1] {
        assert!(value["type"] == "event" || value["type"] == "token", "unexpected record {}", value);
    }
}

#[tokio::test]
async fn test_successful_stream_is_well_formed() {
    let orchestrator = Orchestrator::new(Arc::new(single_claim_model()), Arc::new(ScriptedSearch::new()));
    let lines = ndjson_lines(orchestrator, "Water boils at 100C at sea level.").await;

    assert_well_formed(&lines);
    assert_eq!(lines[0], r#"{"event":"start","payload":{"input":"Water boils at 100C at sea level."}}"#);
    assert_eq!(lines.last().unwrap(), r#"{"event":"done"}"#);
}

#[tokio::test]
async fn test_tokens_arrive_in_order_inside_report_events() {
    let orchestrator = Orchestrator::new(Arc::new(single_claim_model()), Arc::new(ScriptedSearch::new()));
    let records: Vec<StreamRecord> = orchestrator
        .start("Water boils at 100C at sea level.", Mode::Fast)
        .collect()
        .await;

    let tokens: Vec<&str> = records.iter().filter_map(StreamRecord::as_token).collect();
    assert_eq!(tokens, vec!["## Report", "\n", "Unverified."]);

    let position = |name: &str| {
        records
            .iter()
            .position(|r| r.as_event().map(|e| e.event == name).unwrap_or(false))
            .unwrap()
    };
    let first_token = records.iter().position(|r| r.as_token().is_some()).unwrap();
    let last_token = records.iter().rposition(|r| r.as_token().is_some()).unwrap();

    assert!(position("generate_report_start") < first_token);
    assert!(last_token < position("generate_report_end"));

    let end = records[position("generate_report_end")].as_event().unwrap();
    assert_eq!(end.payload.unwrap()["content"], "## Report\nUnverified.");
}

#[tokio::test]
async fn test_branch_events_carry_claim_index() {
    let orchestrator = Orchestrator::new(Arc::new(single_claim_model()), Arc::new(ScriptedSearch::new()));
    let records: Vec<StreamRecord> = orchestrator
        .start("Water boils at 100C at sea level.", Mode::Default)
        .collect()
        .await;

    let branch_events: Vec<_> = records
        .iter()
        .filter_map(StreamRecord::as_event)
        .filter(|e| e.event.starts_with("research_evidence") || e.event.starts_with("verify_evidence"))
        .collect();

    assert!(!branch_events.is_empty());
    for event in branch_events {
        assert_eq!(event.claim_index(), Some(0), "event {}", event.event);
    }
}

#[tokio::test]
async fn test_failed_report_stream_is_well_formed() {
    let model = single_claim_model().with_text_fn(|_| anyhow::bail!("stream refused"));
    let orchestrator = Orchestrator::new(Arc::new(model), Arc::new(ScriptedSearch::new()));
    let lines = ndjson_lines(orchestrator, "Water boils at 100C at sea level.").await;

    assert_well_formed(&lines);
    let last: Value = serde_json::from_str(lines.last().unwrap()).unwrap();
    assert_eq!(last["event"], "error");
    assert!(last["payload"]["message"].as_str().unwrap().contains("stream refused"));
}

#[test]
fn test_rejected_input_is_well_formed() {
    let orchestrator = Orchestrator::new(Arc::new(ScriptedModel::new()), Arc::new(ScriptedSearch::new()))
        .with_limits(RunLimits {
            max_input_bytes: 8,
            ..RunLimits::default()
        });

    let oversized = tokio_test::block_on(ndjson_lines(orchestrator, "far more than eight bytes"));
    assert_well_formed(&oversized);
    assert_eq!(oversized.len(), 2);
    assert!(oversized[1].contains("Maximum input bytes exceeded"));
}

#[tokio::test]
async fn test_empty_input_completes_with_done() {
    let model = ScriptedModel::new()
        .with_structured(CLAIMS_SCHEMA, json!({ "claims": [] }))
        .with_text(&["Nothing to check."]);
    let orchestrator = Orchestrator::new(Arc::new(model), Arc::new(ScriptedSearch::new()));
    let lines = ndjson_lines(orchestrator, "").await;

    assert_well_formed(&lines);
    assert_eq!(lines.last().unwrap(), r#"{"event":"done"}"#);
    assert!(lines.iter().any(|l| l.contains("generate_report_end")));
}
