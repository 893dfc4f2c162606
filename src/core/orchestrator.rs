//! Main orchestrator for run execution.
//!
//! Drives a run through its phases: extract claims, fan out one branch per
//! claim, fold the branch verdicts back in, then stream the report.
//! Admission limits and the run timeout are enforced here.

use std::sync::Arc;

use anyhow::Result;
use futures::{stream, StreamExt};
use tracing::{error, info, info_span, Instrument};

use super::branch::run_branch;
use super::context::{EventSink, PipelineContext, EVENT_CHANNEL_CAPACITY};
use super::error::PipelineError;
use super::extractor::extract_claims;
use super::limits::{LimitViolation, RunLimits};
use super::presets::{preset, Mode, WorkflowConfig};
use super::report::generate_report;
use super::stream::RunStream;
use crate::adapters::{LanguageModel, OpenAiModel, SearchProvider, TavilySearch};
use crate::config::Settings;
use crate::domain::{BranchState, RunPhase, RunState, StreamItem, Verdicts};

/// Main run orchestrator
#[derive(Clone)]
pub struct Orchestrator {
    /// Language model capability
    model: Arc<dyn LanguageModel>,
    /// Web search capability
    search: Arc<dyn SearchProvider>,
    /// Admission limits
    limits: RunLimits,
}

impl Orchestrator {
    /// Create an orchestrator with default limits
    pub fn new(model: Arc<dyn LanguageModel>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            model,
            search,
            limits: RunLimits::default(),
        }
    }

    /// Replace the admission limits
    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build the production orchestrator from validated settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let model = OpenAiModel::from_settings(settings)?;
        let search = TavilySearch::from_settings(settings)?;
        Ok(Self::new(Arc::new(model), Arc::new(search)).with_limits(settings.limits.clone()))
    }

    /// Limits applied to every run
    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    /// Start a run in the background and return its live stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, input: impl Into<String>, mode: Mode) -> RunStream {
        let input = input.into();
        let config = preset(mode);
        let (sink, rx) = EventSink::channel(EVENT_CHANNEL_CAPACITY);

        let orchestrator = self.clone();
        let task_input = input.clone();
        let task = tokio::spawn(async move {
            let limit = orchestrator.limits.run_timeout();
            let run = orchestrator.run(&task_input, config, sink.clone());

            let outcome = match tokio::time::timeout(limit, run).await {
                Ok(Ok(state)) => StreamItem::Completed(Box::new(state)),
                Ok(Err(e)) => StreamItem::Failed(e.to_string()),
                Err(_) => {
                    let err = PipelineError::from(LimitViolation::RunTimeout {
                        limit_seconds: orchestrator.limits.run_timeout_seconds,
                    });
                    error!(error = %err, "Run timed out");
                    StreamItem::Failed(err.to_string())
                }
            };
            sink.send(outcome).await;
        });

        info!(
            %mode,
            model = self.model.name(),
            search = self.search.name(),
            "Run started"
        );
        RunStream::new(&input, rx, task)
    }

    /// Execute a run to completion, emitting progress into `sink`
    pub async fn run(
        &self,
        input: &str,
        config: &'static WorkflowConfig,
        sink: EventSink,
    ) -> Result<RunState, PipelineError> {
        let mut run = RunState::new(input);
        let span = info_span!("run", run_id = %run.id, model = %config.model_name);

        let ctx = PipelineContext {
            model: self.model.clone(),
            search: self.search.clone(),
            config,
            sink,
        };

        match self.execute(&mut run, &ctx).instrument(span.clone()).await {
            Ok(()) => Ok(run),
            Err(e) => {
                span.in_scope(|| error!(error = %e, phase = ?run.phase, "Run failed"));
                run.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(&self, run: &mut RunState, ctx: &PipelineContext) -> Result<(), PipelineError> {
        self.limits.validate()?;
        self.limits.validate_input(&run.input_text)?;
        info!(input_bytes = run.input_text.len(), "Starting run");

        run.advance(RunPhase::Extracting)?;
        run.claims = extract_claims(ctx, &run.input_text).await?;

        run.advance(RunPhase::Verifying)?;
        let branches: Vec<BranchState> = run
            .claims
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, claim)| BranchState::new(index, claim))
            .collect();

        let verdicts = stream::iter(branches)
            .map(|branch| run_branch(ctx.clone(), branch))
            .buffer_unordered(self.limits.max_concurrent_branches)
            .fold(Verdicts::new(), |acc, partial| async move { acc.merge(partial) })
            .await;

        run.advance(RunPhase::Aggregating)?;
        run.merge_verdicts(verdicts);
        info!(
            claims = run.claims.len(),
            verdicts = run.verdicts.len(),
            "Verdicts aggregated"
        );

        run.advance(RunPhase::Reporting)?;
        run.final_report = generate_report(ctx, &run.input_text, run.verdicts.as_slice())
            .await
            .map_err(PipelineError::report)?;

        run.advance(RunPhase::Done)?;
        info!("Run completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::adapters::{ScriptedModel, ScriptedSearch};
    use crate::core::extractor::CLAIMS_SCHEMA;

    fn orchestrator(model: ScriptedModel) -> Orchestrator {
        Orchestrator::new(Arc::new(model), Arc::new(ScriptedSearch::new()))
    }

    #[tokio::test]
    async fn test_empty_claims_reach_done() {
        let model = ScriptedModel::new()
            .with_structured(CLAIMS_SCHEMA, json!({ "claims": [] }))
            .with_text(&["Nothing to check."]);
        let (sink, _rx) = EventSink::channel(64);

        let run = orchestrator(model)
            .run("I love sunny days.", preset(Mode::Default), sink)
            .await
            .unwrap();

        assert!(run.is_done());
        assert!(run.verdicts.is_empty());
        assert_eq!(run.final_report, "Nothing to check.");
        assert!(run.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_empty_input_reaches_done() {
        let model = ScriptedModel::new()
            .with_structured(CLAIMS_SCHEMA, json!({ "claims": [] }))
            .with_text(&["No input to check."]);
        let (sink, _rx) = EventSink::channel(64);

        let run = orchestrator(model)
            .run("   ", preset(Mode::Fast), sink)
            .await
            .unwrap();

        assert!(run.is_done());
        assert!(run.claims.is_empty());
        assert_eq!(run.final_report, "No input to check.");
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected_before_extraction() {
        let model = Arc::new(ScriptedModel::new());
        let orchestrator = Orchestrator::new(model.clone(), Arc::new(ScriptedSearch::new()))
            .with_limits(RunLimits {
                max_concurrent_branches: 0,
                ..RunLimits::default()
            });
        let (sink, _rx) = EventSink::channel(64);

        let err = orchestrator
            .run("Water boils at 100C.", preset(Mode::Fast), sink)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Limit(LimitViolation::ZeroLimit { .. })));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_input_rejected_before_extraction() {
        let model = Arc::new(ScriptedModel::new());
        let orchestrator = Orchestrator::new(model.clone(), Arc::new(ScriptedSearch::new()))
            .with_limits(RunLimits {
                max_input_bytes: 10,
                ..RunLimits::default()
            });
        let (sink, _rx) = EventSink::channel(64);

        let err = orchestrator
            .run("this input is far too long", preset(Mode::Fast), sink)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Limit(LimitViolation::MaxInputBytes { .. })));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_report_failure_fails_run() {
        let model = ScriptedModel::new()
            .with_structured(CLAIMS_SCHEMA, json!({ "claims": [] }))
            .with_text_fn(|_| anyhow::bail!("stream refused"));
        let (sink, _rx) = EventSink::channel(64);

        let err = orchestrator(model)
            .run("Water boils at 100C.", preset(Mode::Default), sink)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Report(msg) if msg.contains("stream refused")));
    }
}
