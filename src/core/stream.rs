//! Client-facing stream of a run.
//!
//! Turns the internal run channel into the NDJSON record sequence a client
//! consumes:
//! - `{"event": "start", "payload": {"input": ...}}` first
//! - `{"type": "event", "content": {...}}` for lifecycle events
//! - `{"type": "token", "content": "..."}` for report fragments
//! - `{"event": "done"}` or `{"event": "error", "payload": {"message": ...}}` last
//!
//! Records are forwarded the moment they arrive; nothing is buffered or
//! reordered across the two channels.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{ProgressEvent, RunState, StreamItem};

/// Message used when the run task vanished without reporting an outcome
const LOST_RUN_MESSAGE: &str = "Run ended without a result";

/// Kind of a tagged stream item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Event,
    Token,
}

/// Kind of a stream boundary marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Start,
    Done,
    Error,
}

/// One NDJSON record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamRecord {
    /// Lifecycle event or report token
    Item {
        #[serde(rename = "type")]
        kind: ItemKind,
        content: Value,
    },

    /// Start, done, or error marker
    Marker {
        event: MarkerKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

impl StreamRecord {
    pub fn start(input: &str) -> Self {
        Self::Marker {
            event: MarkerKind::Start,
            payload: Some(json!({ "input": input })),
        }
    }

    pub fn event(event: &ProgressEvent) -> Self {
        let content = match serde_json::to_value(event) {
            Ok(value) => value,
            Err(_) => json!({ "event": event.event }),
        };
        Self::Item {
            kind: ItemKind::Event,
            content,
        }
    }

    pub fn token(fragment: impl Into<String>) -> Self {
        Self::Item {
            kind: ItemKind::Token,
            content: Value::String(fragment.into()),
        }
    }

    pub fn done() -> Self {
        Self::Marker {
            event: MarkerKind::Done,
            payload: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Marker {
            event: MarkerKind::Error,
            payload: Some(json!({ "message": message.into() })),
        }
    }

    /// Serialize as a single NDJSON line (without the newline)
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Whether this record ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Marker {
                event: MarkerKind::Done | MarkerKind::Error,
                ..
            }
        )
    }

    /// Whether this is the error marker
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::Marker {
                event: MarkerKind::Error,
                ..
            }
        )
    }

    /// Report fragment carried by a token record
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Item {
                kind: ItemKind::Token,
                content,
            } => content.as_str(),
            _ => None,
        }
    }

    /// Lifecycle event carried by an event record
    pub fn as_event(&self) -> Option<ProgressEvent> {
        match self {
            Self::Item {
                kind: ItemKind::Event,
                content,
            } => serde_json::from_value(content.clone()).ok(),
            _ => None,
        }
    }

    /// Message carried by an error marker
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Marker {
                event: MarkerKind::Error,
                payload: Some(payload),
            } => payload.get("message").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Live stream of one run.
///
/// Yields `start` first and exactly one terminal record last, then ends.
/// Dropping the stream aborts the run, cancelling every in-flight branch
/// and the report stream.
pub struct RunStream {
    rx: mpsc::Receiver<StreamItem>,
    task: JoinHandle<()>,
    pending_start: Option<StreamRecord>,
    finished: bool,
    final_state: Option<RunState>,
}

impl RunStream {
    /// Wrap a spawned run and the receiver of its channel
    pub fn new(input: &str, rx: mpsc::Receiver<StreamItem>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task,
            pending_start: Some(StreamRecord::start(input)),
            finished: false,
            final_state: None,
        }
    }

    /// Take the final state of a successful run, available once `done` was yielded
    pub fn into_final_state(mut self) -> Option<RunState> {
        self.final_state.take()
    }
}

impl Stream for RunStream {
    type Item = StreamRecord;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(start) = this.pending_start.take() {
            return Poll::Ready(Some(start));
        }
        if this.finished {
            return Poll::Ready(None);
        }

        let record = match this.rx.poll_recv(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Some(StreamItem::Event(event))) => StreamRecord::event(&event),
            Poll::Ready(Some(StreamItem::Token(fragment))) => StreamRecord::token(fragment),
            Poll::Ready(Some(StreamItem::Completed(state))) => {
                this.finished = true;
                this.final_state = Some(*state);
                StreamRecord::done()
            }
            Poll::Ready(Some(StreamItem::Failed(message))) => {
                this.finished = true;
                StreamRecord::error(message)
            }
            Poll::Ready(None) => {
                this.finished = true;
                StreamRecord::error(LOST_RUN_MESSAGE)
            }
        };
        Poll::Ready(Some(record))
    }
}

impl Drop for RunStream {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            debug!("Run stream dropped, aborting run");
            self.task.abort();
        }
    }
}
