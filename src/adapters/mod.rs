//! Adapter interfaces for external capabilities.
//!
//! The pipeline depends on two black-box services: a language model and a
//! web search provider. Both are consumed through the traits below so that
//! stages never know which vendor sits behind them.

pub mod mock;
pub mod openai;
pub mod tavily;

use std::pin::Pin;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::presets::SearchDepth;

// Re-export the concrete adapters
pub use mock::{ScriptedModel, ScriptedSearch};
pub use openai::OpenAiModel;
pub use tavily::TavilySearch;

/// A lazily produced sequence of text fragments
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A single generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Fully rendered prompt
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, temperature: f32, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature,
            prompt: prompt.into(),
        }
    }
}

/// Target schema for structured generation
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    /// Schema name (also used by scripted doubles to route responses)
    pub name: &'static str,

    /// JSON schema the output must conform to
    pub schema: serde_json::Value,
}

/// Language model capability
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Generate free text
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Generate data conforming to `schema`
    async fn generate_structured(
        &self,
        request: &GenerationRequest,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value>;

    /// Generate free text as a stream of fragments
    async fn stream(&self, request: &GenerationRequest) -> Result<TokenStream>;
}

/// Run a structured generation and validate the result into `T`.
///
/// Malformed output (missing fields, wrong types) is an error here; callers
/// decide whether that error is fatal.
pub async fn generate_as<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    request: &GenerationRequest,
    schema: &OutputSchema,
) -> Result<T> {
    let raw = model.generate_structured(request, schema).await?;
    serde_json::from_value(raw)
        .with_context(|| format!("Model output does not match schema '{}'", schema.name))
}

/// One ranked result from the search provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result URL
    #[serde(default)]
    pub url: String,

    /// Result content
    #[serde(default)]
    pub content: String,

    /// Provider relevance score (if available)
    #[serde(default)]
    pub score: Option<f64>,
}

/// Web search capability
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Return up to `max_results` ranked results for `query`
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchHit>>;
}
