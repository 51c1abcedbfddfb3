//! Stream Sources
//!
//! The seam between the buffering core and whatever actually produces
//! chunks: an SSE connection, a WebSocket, a local model runner. The core
//! never talks to a transport directly; it consumes [`SourceEvent`] values
//! from a channel receiver that a [`StreamSource`] implementation hands out.
//! All I/O waiting lives behind this trait.
//!
//! [`ScriptedSource`] is the in-process implementation used by tests and the
//! replay binary: it plays back a fixed event script, optionally paced with a
//! delay to mimic generation speed.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// One event from a transport stream.
#[derive(Clone, Debug)]
pub enum SourceEvent {
    /// A piece of response text; no terminator framing is required and the
    /// granularity is whatever the transport produces.
    Chunk(String),
    /// Structured out-of-band event (tool calls, usage, annotations),
    /// forwarded to the caller without interpretation.
    Metadata(Value),
    /// The stream completed successfully.
    Complete,
    /// The stream failed; the payload describes the error.
    Error(String),
}

/// A transport that can open an event stream.
///
/// Implementations handle provider-specific details (connection setup, wire
/// format, authentication); the core only ever sees the channel receiver.
/// The channel is closed after `Complete` or `Error`.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Source name, for logs.
    fn name(&self) -> &str;

    /// Opens the stream; events arrive on the returned receiver.
    async fn open_stream(&self) -> anyhow::Result<mpsc::Receiver<SourceEvent>>;
}

/// In-process source that replays a fixed script of events.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    events: Vec<SourceEvent>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    /// Creates a source that will replay `events` in order.
    #[must_use]
    pub fn new(events: Vec<SourceEvent>) -> Self {
        Self {
            events,
            delay: None,
        }
    }

    /// Convenience constructor: one `Chunk` per item, then `Complete`.
    #[must_use]
    pub fn from_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let events = chunks
            .into_iter()
            .map(|chunk| SourceEvent::Chunk(chunk.into()))
            .chain(std::iter::once(SourceEvent::Complete))
            .collect();
        Self::new(events)
    }

    /// Sleeps between events to mimic generation pacing.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_stream(&self) -> anyhow::Result<mpsc::Receiver<SourceEvent>> {
        let (tx, rx) = mpsc::channel(64);
        let events = self.events.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            for event in events {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_source_replays_in_order() {
        let source = ScriptedSource::from_chunks(["one", "two"]);
        let mut rx = source.open_stream().await.unwrap();

        assert!(matches!(rx.recv().await, Some(SourceEvent::Chunk(c)) if c == "one"));
        assert!(matches!(rx.recv().await, Some(SourceEvent::Chunk(c)) if c == "two"));
        assert!(matches!(rx.recv().await, Some(SourceEvent::Complete)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_scripted_source_carries_metadata_and_errors() {
        let source = ScriptedSource::new(vec![
            SourceEvent::Metadata(serde_json::json!({ "usage": 7 })),
            SourceEvent::Error("connection lost".to_string()),
        ]);
        let mut rx = source.open_stream().await.unwrap();

        assert!(matches!(rx.recv().await, Some(SourceEvent::Metadata(_))));
        assert!(matches!(rx.recv().await, Some(SourceEvent::Error(e)) if e == "connection lost"));
    }
}
