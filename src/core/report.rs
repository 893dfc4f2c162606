//! Final report generation.
//!
//! The report is streamed: each fragment goes to the sink as a token the
//! moment the model yields it, and the assembled text is returned at the end.

use anyhow::{Context, Result};
use futures::StreamExt;
use serde_json::json;
use tracing::debug;

use super::context::PipelineContext;
use crate::domain::events::names;
use crate::domain::{ProgressEvent, Verdict};

/// Number of sources cited per claim in the report
pub const MAX_CITED_SOURCES: usize = 2;

/// Summary text when the run found nothing to check
pub const NO_CLAIMS_TEXT: &str = "No checkable claims were found.";

/// Render verdicts as the plain-text block handed to the model
pub fn format_verdicts(verdicts: &[Verdict]) -> String {
    if verdicts.is_empty() {
        return NO_CLAIMS_TEXT.to_string();
    }

    verdicts
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let sources: Vec<String> = v
                .evidence_used
                .iter()
                .take(MAX_CITED_SOURCES)
                .map(|e| format!("[{}]({})", e.source, e.source))
                .collect();
            let sources = if sources.is_empty() {
                "none".to_string()
            } else {
                sources.join(", ")
            };

            format!(
                "Claim {}: {}\nVerdict: {}\nConfidence: {}%\nJustification: {}\nSources: {}",
                i + 1,
                v.claim,
                v.status,
                v.confidence_percent(),
                v.justification,
                sources
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_prompt(input_text: &str, verdicts_text: &str) -> String {
    format!(
        "Write a fact-check report in markdown for the text below.\n\
         \n\
         For each claim give the verdict, the confidence as a percentage, the \
         justification, and its sources as markdown links (at most {} per claim). \
         End with a \"Summary\" section giving an overall assessment of the text.\n\
         If there are no claims, say so briefly in the summary.\n\
         \n\
         Original text:\n{}\n\
         \n\
         Verdicts:\n{}",
        MAX_CITED_SOURCES, input_text, verdicts_text
    )
}

/// Stream the final report, returning the assembled markdown
pub async fn generate_report(
    ctx: &PipelineContext,
    input_text: &str,
    verdicts: &[Verdict],
) -> Result<String> {
    ctx.sink
        .emit(ProgressEvent::new(names::GENERATE_REPORT_START))
        .await;

    let request = ctx.request(build_prompt(input_text, &format_verdicts(verdicts)));
    let mut fragments = ctx
        .model
        .stream(&request)
        .await
        .context("Failed to start report stream")?;

    let mut report = String::new();
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment.context("Report stream interrupted")?;
        if fragment.is_empty() {
            continue;
        }
        report.push_str(&fragment);
        ctx.sink.token(fragment).await;
    }
    debug!(chars = report.len(), "Report generated");

    ctx.sink
        .emit(ProgressEvent::with_payload(
            names::GENERATE_REPORT_END,
            &json!({ "content": report }),
        ))
        .await;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::adapters::{ScriptedModel, ScriptedSearch};
    use crate::core::context::EventSink;
    use crate::core::presets::{preset, Mode};
    use crate::domain::{Evidence, StreamItem, VerdictStatus};

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
    fn test_format_verdicts_cites_two_sources() {
        let verdict = Verdict {
            claim: "The Eiffel Tower is in Berlin".into(),
            status: VerdictStatus::Refutes,
            confidence: 0.92,
            justification: "It is in Paris".into(),
            evidence_used: (0..3)
                .map(|i| Evidence::from_hit(format!("https://s{}", i), "x", None, 10))
                .collect(),
        };

        let text = format_verdicts(&[verdict]);
        assert!(text.contains("Verdict: REFUTES"));
        assert!(text.contains("Confidence: 92%"));
        assert!(text.contains("[https://s1](https://s1)"));
        assert!(!text.contains("https://s2"));
        assert_eq!(format_verdicts(&[]), NO_CLAIMS_TEXT);
    }

    #[tokio::test]
    async fn test_tokens_streamed_in_order_between_events() {
        let (ctx, mut rx) = context(ScriptedModel::new().with_text(&["# Report", "\n", "All good."]));

        let report = generate_report(&ctx, "text", &[]).await.unwrap();
        assert_eq!(report, "# Report\nAll good.");

        drop(ctx);
        let mut seen = Vec::new();
        while let Some(item) = rx.recv().await {
            seen.push(match item {
                StreamItem::Event(e) => format!("event:{}", e.event),
                StreamItem::Token(t) => format!("token:{}", t),
                _ => unreachable!(),
            });
        }
        assert_eq!(
            seen,
            vec![
                "event:generate_report_start",
                "token:# Report",
                "token:\n",
                "token:All good.",
                "event:generate_report_end",
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_error_fails_report() {
        let (ctx, _rx) = context(ScriptedModel::new().with_text_fn(|_| anyhow::bail!("quota exceeded")));
        let err = generate_report(&ctx, "text", &[]).await.unwrap_err();
        assert!(format!("{:#}", err).contains("quota exceeded"));
    }
}
