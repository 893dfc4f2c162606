//! OpenAI-compatible chat completions adapter.
//!
//! Talks to any `/chat/completions` endpoint speaking the OpenAI wire
//! format. Structured output uses `response_format: json_schema`; streaming
//! parses server-sent `data:` lines until `[DONE]`.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use super::{GenerationRequest, LanguageModel, OutputSchema, TokenStream};
use crate::config::Settings;

/// Language model backed by an OpenAI-compatible HTTP API
pub struct OpenAiModel {
    /// HTTP client
    client: reqwest::Client,
    /// API base URL (e.g. https://api.openai.com/v1)
    base_url: String,
    /// Bearer token
    api_key: String,
}

impl OpenAiModel {
    /// Create a new client
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Create from resolved settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.openai_base_url.clone(),
            settings.openai_api_key.clone(),
            settings.request_timeout(),
        )
    }

    /// Resolve the chat completions endpoint from the base URL
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    fn request_body(request: &GenerationRequest) -> Value {
        json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": [{ "role": "user", "content": request.prompt }],
        })
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .context("LLM request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error {}: {}", status, text.trim());
        }

        Ok(response)
    }

    async fn complete(&self, body: &Value) -> Result<String> {
        let json: Value = self
            .post(body)
            .await?
            .json()
            .await
            .context("Failed to parse LLM JSON")?;

        message_content(&json)
    }
}

/// Extract `choices[0].message.content` from a completion response
fn message_content(json: &Value) -> Result<String> {
    json["choices"]
        .get(0)
        .and_then(|c| c["message"]["content"].as_str())
        .map(str::to_string)
        .context("LLM response has no message content")
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.complete(&Self::request_body(request)).await
    }

    async fn generate_structured(
        &self,
        request: &GenerationRequest,
        schema: &OutputSchema,
    ) -> Result<Value> {
        let mut body = Self::request_body(request);
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "schema": schema.schema,
            },
        });

        let content = self.complete(&body).await?;
        serde_json::from_str(&content)
            .with_context(|| format!("Structured output for '{}' is not valid JSON", schema.name))
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<TokenStream> {
        let mut body = Self::request_body(request);
        body["stream"] = Value::Bool(true);

        let bytes = Box::pin(self.post(&body).await?.bytes_stream());

        let tokens = futures::stream::unfold(
            (bytes, SseDecoder::default(), VecDeque::new()),
            |(mut bytes, mut decoder, mut pending)| async move {
                loop {
                    if let Some(token) = pending.pop_front() {
                        return Some((Ok(token), (bytes, decoder, pending)));
                    }
                    if decoder.is_done() {
                        return None;
                    }

                    match bytes.next().await {
                        Some(Ok(chunk)) => match decoder.push(&chunk) {
                            Ok(tokens) => pending.extend(tokens),
                            Err(e) => {
                                decoder.finish();
                                return Some((Err(e), (bytes, decoder, pending)));
                            }
                        },
                        Some(Err(e)) => {
                            decoder.finish();
                            let err = anyhow::Error::new(e).context("LLM stream interrupted");
                            return Some((Err(err), (bytes, decoder, pending)));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(tokens))
    }
}

/// Incremental decoder for chat completion server-sent events
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Feed raw bytes, returning any complete content deltas
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);
        let mut tokens = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                self.done = true;
                break;
            }

            let event: Value =
                serde_json::from_str(data).context("Malformed stream event from LLM")?;
            if let Some(content) = event["choices"]
                .get(0)
                .and_then(|c| c["delta"]["content"].as_str())
            {
                if !content.is_empty() {
                    tokens.push(content.to_string());
                }
            }
        }

        Ok(tokens)
    }

    fn finish(&mut self) {
        self.done = true;
    }

    fn is_done(&self) -> bool {
        self.done
    }
}
