//! Scripted in-memory capabilities.
//!
//! Deterministic stand-ins for the language model and search provider.
//! Responses are routed by schema name (model) or query substring (search),
//! failures can be injected, and every call is recorded for assertions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{
    GenerationRequest, LanguageModel, OutputSchema, SearchHit, SearchProvider, TokenStream,
};
use crate::core::presets::SearchDepth;

type StructuredFn = dyn Fn(&GenerationRequest) -> Result<Value> + Send + Sync;
type TextFn = dyn Fn(&GenerationRequest) -> Result<Vec<String>> + Send + Sync;

fn no_text(_: &GenerationRequest) -> Result<Vec<String>> {
    Ok(Vec::new())
}

/// Language model double
pub struct ScriptedModel {
    structured: HashMap<&'static str, Arc<StructuredFn>>,
    text: Arc<TextFn>,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    /// Create a model that knows no schemas and streams nothing
    pub fn new() -> Self {
        Self {
            structured: HashMap::new(),
            text: Arc::new(no_text),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answer `schema` with `value`
    pub fn with_structured(self, schema: &'static str, value: Value) -> Self {
        self.with_structured_fn(schema, move |_| Ok(value.clone()))
    }

    /// Answer `schema` by calling `f` with the request
    pub fn with_structured_fn<F>(mut self, schema: &'static str, f: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<Value> + Send + Sync + 'static,
    {
        self.structured.insert(schema, Arc::new(f));
        self
    }

    /// Stream these fragments for every free-text request
    pub fn with_text(self, fragments: &[&str]) -> Self {
        let fragments: Vec<String> = fragments.iter().map(|s| s.to_string()).collect();
        self.with_text_fn(move |_| Ok(fragments.clone()))
    }

    /// Produce free-text fragments by calling `f` with the request
    pub fn with_text_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<Vec<String>> + Send + Sync + 'static,
    {
        self.text = Arc::new(f);
        self
    }

    /// Every prompt received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn record(&self, request: &GenerationRequest) {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.record(request);
        Ok((self.text)(request)?.concat())
    }

    async fn generate_structured(
        &self,
        request: &GenerationRequest,
        schema: &OutputSchema,
    ) -> Result<Value> {
        self.record(request);
        match self.structured.get(schema.name) {
            Some(f) => f(request),
            None => anyhow::bail!("No scripted response for schema '{}'", schema.name),
        }
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<TokenStream> {
        self.record(request);
        let fragments = (self.text)(request)?;
        let items: Vec<Result<String>> = fragments.into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

enum SearchOutcome {
    Hits(Vec<SearchHit>),
    Fail(String),
}

/// Search provider double
#[derive(Default)]
pub struct ScriptedSearch {
    rules: Vec<(String, SearchOutcome)>,
    delays: Vec<(String, Duration)>,
    calls: Mutex<Vec<(String, usize, SearchDepth)>>,
}

impl ScriptedSearch {
    /// Create a provider that returns no results
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `hits` for queries containing `needle`
    pub fn with_hits(mut self, needle: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        self.rules.push((needle.into(), SearchOutcome::Hits(hits)));
        self
    }

    /// Fail queries containing `needle`
    pub fn failing_on(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules
            .push((needle.into(), SearchOutcome::Fail(message.into())));
        self
    }

    /// Sleep before answering queries containing `needle`
    pub fn with_delay(mut self, needle: impl Into<String>, delay: Duration) -> Self {
        self.delays.push((needle.into(), delay));
        self
    }

    /// Every `(query, max_results, depth)` received so far
    pub fn calls(&self) -> Vec<(String, usize, SearchDepth)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

/// Convenience constructor for a scored hit
pub fn hit(url: &str, content: &str, score: Option<f64>) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        content: content.to_string(),
        score,
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchHit>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((query.to_string(), max_results, depth));
        }

        let delay = self
            .delays
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .rules
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, outcome)| outcome);

        match outcome {
            Some(SearchOutcome::Hits(hits)) => Ok(hits.iter().take(max_results).cloned().collect()),
            Some(SearchOutcome::Fail(message)) => anyhow::bail!("{}", message),
            None => Ok(Vec::new()),
        }
    }
}
