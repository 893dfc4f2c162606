//! What every stage receives: capabilities, the run's preset, and the
//! event sink feeding the client stream.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use super::presets::WorkflowConfig;
use crate::adapters::{GenerationRequest, LanguageModel, SearchProvider};
use crate::domain::{ProgressEvent, StreamItem};

/// Capacity of the per-run event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Producer side of the run channel.
///
/// Lifecycle events and report tokens go through the same channel, so the
/// reader observes them in emission order. Cloned into every branch.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamItem>,
}

impl EventSink {
    /// Create a sink and the receiver that drains it
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamItem>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Emit a lifecycle event
    pub async fn emit(&self, event: ProgressEvent) {
        self.send(StreamItem::Event(event)).await;
    }

    /// Emit a report fragment
    pub async fn token(&self, fragment: impl Into<String>) {
        self.send(StreamItem::Token(fragment.into())).await;
    }

    /// Send any item. A closed receiver means the client went away; the
    /// item is dropped and the run is expected to be aborted by its owner.
    pub async fn send(&self, item: StreamItem) {
        if self.tx.send(item).await.is_err() {
            debug!("Event receiver closed, dropping item");
        }
    }
}

/// Shared inputs for every stage of one run
#[derive(Clone)]
pub struct PipelineContext {
    /// Language model capability
    pub model: Arc<dyn LanguageModel>,

    /// Web search capability
    pub search: Arc<dyn SearchProvider>,

    /// Preset selected at run start
    pub config: &'static WorkflowConfig,

    /// Event sink for this run
    pub sink: EventSink,
}

impl PipelineContext {
    /// Build a generation request using the run's model settings
    pub fn request(&self, prompt: impl Into<String>) -> GenerationRequest {
        GenerationRequest::new(
            self.config.model_name.clone(),
            self.config.temperature,
            prompt,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_preserves_order_across_channels() {
        let (sink, mut rx) = EventSink::channel(8);

        sink.emit(ProgressEvent::new("a")).await;
        sink.token("t1").await;
        sink.emit(ProgressEvent::new("b")).await;
        drop(sink);

        let mut seen = Vec::new();
        while let Some(item) = rx.recv().await {
            seen.push(match item {
                StreamItem::Event(e) => e.event,
                StreamItem::Token(t) => t,
                _ => unreachable!(),
            });
        }
        assert_eq!(seen, vec!["a", "t1", "b"]);
    }

    #[tokio::test]
    async fn test_sink_tolerates_closed_receiver() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        sink.emit(ProgressEvent::new("ignored")).await;
    }
}
