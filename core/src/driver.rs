//! Stream Driver
//!
//! The adapter between one transport stream and one session buffer. The
//! driver consumes [`SourceEvent`] values from a channel receiver, routes
//! chunk text into the session's buffer through the registry, and republishes
//! what comes back (the flush increment plus the raw chunk) as
//! [`DriverUpdate`] values the caller can render from. Completion and failure
//! mark the session non-streaming and release the receiver; the driver itself
//! implements no buffering logic.
//!
//! Two consumption styles are offered, matching how surfaces actually run:
//! a non-blocking [`poll`] drain for frame-loop callers, and an async
//! [`run`]/[`spawn`] pump for task-based callers.
//!
//! [`poll`]: StreamDriver::poll
//! [`run`]: StreamDriver::run
//! [`spawn`]: StreamDriver::spawn

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_stream::wrappers::ReceiverStream;

use crate::buffer::BufferConfig;
use crate::manager::{SessionKey, SessionManager};
use crate::source::SourceEvent;

/// Message from the transport that ended a stream without a terminal event.
const DISCONNECT_ERROR: &str = "stream source disconnected unexpectedly";

/// Update republished to the caller for one source event.
#[derive(Clone, Debug)]
pub enum DriverUpdate {
    /// A chunk arrived. `emitted` is the flush increment the buffer released
    /// (possibly empty when the policy did not fire); `chunk` is the raw
    /// transport text for callers that track the live tail themselves.
    Content {
        /// Increment released by the flush policy; may be empty.
        emitted: String,
        /// The raw chunk as received from the transport.
        chunk: String,
    },
    /// Structured out-of-band event, forwarded verbatim.
    Metadata {
        /// The event payload.
        payload: Value,
    },
    /// The stream completed. Carries the session's full accumulated text so
    /// callers can materialize the tail without a flush.
    Completed {
        /// Entire accumulated text of the session.
        full_text: String,
    },
    /// The stream failed. Already-flushed content stays intact in the
    /// session; `partial` is everything accumulated up to the failure.
    Failed {
        /// Error description from the transport.
        error: String,
        /// Entire accumulated text at the moment of failure.
        partial: String,
    },
}

/// Routes one transport stream into one session buffer.
pub struct StreamDriver {
    key: SessionKey,
    config: BufferConfig,
    manager: Arc<SessionManager>,
    receiver: mpsc::Receiver<SourceEvent>,
    finished: bool,
}

impl StreamDriver {
    /// Attaches a driver to `key`: lazily registers the session with
    /// `config` and marks it streaming.
    pub fn new(
        key: impl Into<SessionKey>,
        manager: Arc<SessionManager>,
        config: BufferConfig,
        receiver: mpsc::Receiver<SourceEvent>,
    ) -> Self {
        let key = key.into();
        {
            let mut entry = manager.get_or_create(key.clone(), config.clone());
            entry.set_streaming(true);
        }
        tracing::debug!(session = %key, "stream driver attached");

        Self {
            key,
            config,
            manager,
            receiver,
            finished: false,
        }
    }

    /// The session key this driver feeds.
    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Whether a terminal event (completion, failure, disconnect) has been
    /// processed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drains every event currently available, without blocking.
    ///
    /// Returns one update per consumed event, in arrival order. After a
    /// terminal event the driver stays finished and further calls return
    /// nothing.
    pub fn poll(&mut self) -> Vec<DriverUpdate> {
        let mut updates = Vec::new();
        while !self.finished {
            match self.receiver.try_recv() {
                Ok(event) => updates.push(self.apply(event)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    updates.push(self.fail(DISCONNECT_ERROR.to_string()));
                }
            }
        }
        updates
    }

    /// Pumps the stream to completion, republishing updates on `updates`.
    ///
    /// Returns when a terminal event has been forwarded, the source channel
    /// closes, or the caller drops the update receiver (the session is still
    /// marked non-streaming in that case).
    pub async fn run(mut self, updates: mpsc::Sender<DriverUpdate>) {
        while let Some(event) = self.receiver.recv().await {
            let update = self.apply(event);
            if updates.send(update).await.is_err() {
                if !self.finished {
                    self.finish();
                }
                return;
            }
            if self.finished {
                return;
            }
        }

        if !self.finished {
            let update = self.fail(DISCONNECT_ERROR.to_string());
            let _ = updates.send(update).await;
        }
    }

    /// Spawns [`run`](Self::run) on a task and returns the update stream.
    #[must_use]
    pub fn spawn(self) -> ReceiverStream<DriverUpdate> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(self.run(tx));
        ReceiverStream::new(rx)
    }

    fn apply(&mut self, event: SourceEvent) -> DriverUpdate {
        match event {
            SourceEvent::Chunk(chunk) => {
                let emitted = {
                    let mut entry = self
                        .manager
                        .get_or_create(self.key.clone(), self.config.clone());
                    entry.buffer_mut().push(&chunk)
                };
                DriverUpdate::Content { emitted, chunk }
            }
            SourceEvent::Metadata(payload) => DriverUpdate::Metadata { payload },
            SourceEvent::Complete => {
                let full_text = self.finish();
                tracing::debug!(session = %self.key, bytes = full_text.len(), "stream completed");
                DriverUpdate::Completed { full_text }
            }
            SourceEvent::Error(error) => self.fail(error),
        }
    }

    fn fail(&mut self, error: String) -> DriverUpdate {
        let partial = self.finish();
        tracing::warn!(session = %self.key, error = %error, "stream failed");
        DriverUpdate::Failed { error, partial }
    }

    /// Marks the session non-streaming, closes the receiver, and returns the
    /// session's full accumulated text.
    fn finish(&mut self) -> String {
        self.finished = true;
        self.receiver.close();
        self.manager.set_streaming(&self.key, false);
        self.manager.state_of(&self.key).buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ScriptedSource, StreamSource};
    use tokio_stream::StreamExt;

    fn test_config() -> BufferConfig {
        BufferConfig {
            min_flush_bytes: 10,
            max_flush_bytes: 30,
            code_block_aware: true,
        }
    }

    async fn drain(driver: &mut StreamDriver) -> Vec<DriverUpdate> {
        // Scripted events hop through a spawned task; yield until the
        // terminal event lands.
        let mut updates = Vec::new();
        while !driver.is_finished() {
            updates.extend(driver.poll());
            tokio::task::yield_now().await;
        }
        updates
    }

    #[tokio::test]
    async fn test_chunks_route_through_the_session_buffer() {
        let manager = Arc::new(SessionManager::new());
        let source = ScriptedSource::from_chunks(["Hello", " world", ", again"]);
        let receiver = source.open_stream().await.unwrap();

        let mut driver = StreamDriver::new("chat", Arc::clone(&manager), test_config(), receiver);
        let updates = drain(&mut driver).await;

        let emitted: String = updates
            .iter()
            .filter_map(|u| match u {
                DriverUpdate::Content { emitted, .. } => Some(emitted.as_str()),
                _ => None,
            })
            .collect();
        let state = manager.state_of(&SessionKey::from("chat"));
        assert_eq!(emitted, state.content);
        assert_eq!(state.buffer, "Hello world, again");
        assert!(!state.streaming);
    }

    #[tokio::test]
    async fn test_completion_carries_full_text() {
        let manager = Arc::new(SessionManager::new());
        let source = ScriptedSource::from_chunks(["tail"]);
        let receiver = source.open_stream().await.unwrap();

        let mut driver = StreamDriver::new("chat", Arc::clone(&manager), test_config(), receiver);
        assert!(manager.state_of(&SessionKey::from("chat")).streaming);

        let updates = drain(&mut driver).await;
        let last = updates.last().unwrap();
        assert!(matches!(last, DriverUpdate::Completed { full_text } if full_text == "tail"));
        assert!(!manager.state_of(&SessionKey::from("chat")).streaming);
    }

    #[tokio::test]
    async fn test_error_keeps_flushed_content_and_reports_partial() {
        let manager = Arc::new(SessionManager::new());
        let source = ScriptedSource::new(vec![
            SourceEvent::Chunk("released text.".to_string()),
            SourceEvent::Chunk("pending".to_string()),
            SourceEvent::Error("backend went away".to_string()),
        ]);
        let receiver = source.open_stream().await.unwrap();

        let mut driver = StreamDriver::new("chat", Arc::clone(&manager), test_config(), receiver);
        let updates = drain(&mut driver).await;

        let last = updates.last().unwrap();
        assert!(matches!(
            last,
            DriverUpdate::Failed { error, partial }
                if error == "backend went away" && partial == "released text.pending"
        ));

        // Already-flushed content is intact and retrievable.
        let state = manager.state_of(&SessionKey::from("chat"));
        assert_eq!(state.content, "released text.");
        assert!(!state.streaming);
    }

    #[tokio::test]
    async fn test_source_disconnect_is_reported_as_failure() {
        let manager = Arc::new(SessionManager::new());
        let (tx, rx) = mpsc::channel(8);
        tx.send(SourceEvent::Chunk("partial".to_string()))
            .await
            .unwrap();
        drop(tx);

        let mut driver = StreamDriver::new("chat", Arc::clone(&manager), test_config(), rx);
        let updates = drain(&mut driver).await;

        assert!(matches!(
            updates.last().unwrap(),
            DriverUpdate::Failed { error, .. } if error == DISCONNECT_ERROR
        ));
    }

    #[tokio::test]
    async fn test_metadata_passes_through_verbatim() {
        let manager = Arc::new(SessionManager::new());
        let payload = serde_json::json!({ "tool": "search", "status": "running" });
        let source = ScriptedSource::new(vec![
            SourceEvent::Metadata(payload.clone()),
            SourceEvent::Complete,
        ]);
        let receiver = source.open_stream().await.unwrap();

        let mut driver = StreamDriver::new("chat", Arc::clone(&manager), test_config(), receiver);
        let updates = drain(&mut driver).await;

        assert!(matches!(
            &updates[0],
            DriverUpdate::Metadata { payload: p } if *p == payload
        ));
    }

    #[tokio::test]
    async fn test_spawn_streams_updates_to_completion() {
        let manager = Arc::new(SessionManager::new());
        let source = ScriptedSource::from_chunks(["streamed ", "as ", "a ", "stream"]);
        let receiver = source.open_stream().await.unwrap();

        let driver = StreamDriver::new("chat", Arc::clone(&manager), test_config(), receiver);
        let updates: Vec<DriverUpdate> = driver.spawn().collect().await;

        assert!(matches!(
            updates.last().unwrap(),
            DriverUpdate::Completed { full_text } if full_text == "streamed as a stream"
        ));
    }
}
