//! Claim extraction.
//!
//! Turns free-form text into check-worthy claims, highest priority first.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::context::PipelineContext;
use super::error::PipelineError;
use crate::adapters::{generate_as, OutputSchema};
use crate::domain::claim::DEFAULT_PRIORITY;
use crate::domain::events::names;
use crate::domain::{Claim, ProgressEvent};

/// Schema name for extraction output
pub const CLAIMS_SCHEMA: &str = "claims_list";

/// Claim as returned by the model, before normalization
#[derive(Debug, Deserialize)]
struct RawClaim {
    #[serde(default)]
    text: String,
    #[serde(default)]
    priority: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ClaimsList {
    #[serde(default)]
    claims: Vec<RawClaim>,
}

fn claims_schema() -> OutputSchema {
    OutputSchema {
        name: CLAIMS_SCHEMA,
        schema: json!({
            "type": "object",
            "properties": {
                "claims": {
                    "type": "array",
                    "description": "Factual claims to be verified",
                    "items": {
                        "type": "object",
                        "properties": {
                            "text": { "type": "string", "description": "The claim text" },
                            "priority": {
                                "type": "integer",
                                "minimum": 1,
                                "maximum": 10,
                                "description": "Priority level (1-10, higher is more important)"
                            }
                        },
                        "required": ["text", "priority"]
                    }
                }
            },
            "required": ["claims"]
        }),
    }
}

fn build_prompt(input_text: &str) -> String {
    format!(
        "You extract check-worthy factual claims for a fact-checking desk.\n\
         \n\
         Keep statements that can be shown true or false: dates, numbers, statistics, \
         events, and assertions about people, places, organisations or things.\n\
         Skip opinions, subjective judgements, questions, and vague statements with no \
         specific fact in them. Resolve pronouns so each claim stands on its own.\n\
         \n\
         Give every claim a priority from 1 to 10, higher meaning more important to check.\n\
         \n\
         Text:\n{}",
        input_text
    )
}

/// Sort claims by priority, highest first, keeping extraction order on ties
pub fn prioritize(mut claims: Vec<Claim>) -> Vec<Claim> {
    claims.sort_by(|a, b| b.priority.cmp(&a.priority));
    claims
}

fn normalize(raw: Vec<RawClaim>) -> Vec<Claim> {
    raw.into_iter()
        .filter_map(|c| {
            let text = c.text.trim();
            if text.is_empty() {
                return None;
            }
            let priority = c
                .priority
                .filter(|p| p.is_finite())
                .map(|p| p.round().clamp(1.0, 10.0) as u8)
                .unwrap_or(DEFAULT_PRIORITY);
            Some(Claim::new(text, priority))
        })
        .collect()
}

/// Extract and prioritize claims from `input_text`.
///
/// Finding no claims is not an error. A failing or malformed model call is.
pub async fn extract_claims(
    ctx: &PipelineContext,
    input_text: &str,
) -> Result<Vec<Claim>, PipelineError> {
    ctx.sink
        .emit(ProgressEvent::new(names::EXTRACT_CLAIMS_START))
        .await;

    let request = ctx.request(build_prompt(input_text));
    let raw: ClaimsList = generate_as(ctx.model.as_ref(), &request, &claims_schema())
        .await
        .map_err(PipelineError::extraction)?;

    let claims = prioritize(normalize(raw.claims));
    info!(count = claims.len(), "Claims extracted");
    debug!(?claims, "Extracted claims");

    ctx.sink
        .emit(ProgressEvent::with_payload(names::EXTRACT_CLAIMS_END, &claims))
        .await;

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::adapters::{ScriptedModel, ScriptedSearch};
    use crate::core::context::EventSink;
    use crate::core::presets::{preset, Mode};
    use crate::domain::StreamItem;

    fn context(model: ScriptedModel) -> (PipelineContext, tokio::sync::mpsc::Receiver<StreamItem>) {
        let (sink, rx) = EventSink::channel(64);
        let ctx = PipelineContext {
            model: Arc::new(model),
            search: Arc::new(ScriptedSearch::new()),
            config: preset(Mode::Default),
            sink,
        };
        (ctx, rx)
    }

    #[test]
    fn test_prioritize_is_stable() {
        let claims = vec![
            Claim::new("a", 3),
            Claim::new("b", 8),
            Claim::new("c", 3),
            Claim::new("d", 8),
        ];
        let texts: Vec<_> = prioritize(claims).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["b", "d", "a", "c"]);
    }

    #[tokio::test]
    async fn test_extract_sorts_and_normalizes() {
        let model = ScriptedModel::new().with_structured(
            CLAIMS_SCHEMA,
            json!({"claims": [
                {"text": "Low", "priority": 2},
                {"text": "  ", "priority": 9},
                {"text": "Unset"},
                {"text": "High", "priority": 14.2}
            ]}),
        );
        let (ctx, _rx) = context(model);

        let claims = extract_claims(&ctx, "some text").await.unwrap();
        let summary: Vec<_> = claims.iter().map(|c| (c.text.as_str(), c.priority)).collect();
        assert_eq!(summary, vec![("High", 10), ("Unset", 5), ("Low", 2)]);
    }

    #[tokio::test]
    async fn test_no_claims_is_not_an_error() {
        let model = ScriptedModel::new().with_structured(CLAIMS_SCHEMA, json!({"claims": []}));
        let (ctx, mut rx) = context(model);

        let claims = extract_claims(&ctx, "What a lovely day!").await.unwrap();
        assert!(claims.is_empty());

        drop(ctx);
        let mut seen = Vec::new();
        while let Some(StreamItem::Event(e)) = rx.recv().await {
            seen.push(e.event);
        }
        assert_eq!(seen, vec![names::EXTRACT_CLAIMS_START, names::EXTRACT_CLAIMS_END]);
    }

    #[tokio::test]
    async fn test_model_failure_is_extraction_error() {
        let model = ScriptedModel::new()
            .with_structured_fn(CLAIMS_SCHEMA, |_| anyhow::bail!("model unavailable"));
        let (ctx, _rx) = context(model);

        let result = extract_claims(&ctx, "text").await;
        assert!(matches!(result, Err(PipelineError::Extraction(msg)) if msg.contains("model unavailable")));
    }

    #[tokio::test]
    async fn test_prompt_contains_input() {
        let model = Arc::new(ScriptedModel::new().with_structured(CLAIMS_SCHEMA, json!({"claims": []})));
        let (sink, _rx) = EventSink::channel(8);
        let ctx = PipelineContext {
            model: model.clone(),
            search: Arc::new(ScriptedSearch::new()),
            config: preset(Mode::Fast),
            sink,
        };

        extract_claims(&ctx, "The Eiffel Tower was built in 1889.").await.unwrap();
        assert!(model.prompts()[0].contains("The Eiffel Tower was built in 1889."));
    }
}
