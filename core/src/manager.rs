//! Session Management
//!
//! Callers that stream several model replies at once (one per pane, one per
//! agent, one per tab) need an independent buffer per logical stream. The
//! [`SessionManager`] is that registry: a concurrent map from opaque caller
//! supplied keys to session entries, created lazily on first access and
//! removed only when the owner says so.
//!
//! # Design Philosophy
//!
//! The registry is an explicit object owned by the caller; there is no
//! ambient global state. Entry lifetime belongs to the registry; external
//! code holds only the key. Sessions never share mutable state, so streams
//! progress independently and concurrent chunk arrival for *different* keys
//! needs no coordination beyond the map itself. Per key, the usual
//! single-writer discipline applies: one logical timeline of calls.
//!
//! Removal does not flush: a caller that wants the unflushed tail reads
//! `full_text` before calling [`SessionManager::remove`].

use dashmap::mapref::one::{Ref, RefMut};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::buffer::{BufferConfig, CodeBlockPreview, StreamBuffer};

/// Opaque session identity supplied by the caller.
///
/// Any uniqueness scheme works; the core imposes no ordering semantics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(pub String);

impl SessionKey {
    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One registered session: its buffer plus transport liveness.
#[derive(Clone, Debug)]
pub struct SessionEntry {
    buffer: StreamBuffer,
    streaming: bool,
}

impl SessionEntry {
    fn new(config: BufferConfig) -> Self {
        Self {
            buffer: StreamBuffer::new(config),
            streaming: false,
        }
    }

    /// The session's buffer.
    #[must_use]
    pub fn buffer(&self) -> &StreamBuffer {
        &self.buffer
    }

    /// Mutable access to the session's buffer.
    pub fn buffer_mut(&mut self) -> &mut StreamBuffer {
        &mut self.buffer
    }

    /// Whether a transport is currently delivering chunks to this session.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Records transport liveness; set by the stream driver on start,
    /// completion, and failure.
    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            streaming: self.streaming,
            content: self.buffer.flushed_text().to_string(),
            buffer: self.buffer.full_text().to_string(),
            in_code_block: self.buffer.is_in_code_block(),
            incomplete_block: self.buffer.incomplete_code_block(),
        }
    }
}

/// Read-only view of one session's state, safe to ship to any surface.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Whether a transport is currently delivering chunks.
    pub streaming: bool,
    /// Flushed, caller-visible text: what a renderer currently shows.
    pub content: String,
    /// The entire raw accumulated log, including the unflushed tail.
    pub buffer: String,
    /// Whether a fenced code block is currently open.
    pub in_code_block: bool,
    /// Preview of the open block's held-back content, if any.
    pub incomplete_block: Option<CodeBlockPreview>,
}

/// Keyed registry of independent session buffers.
///
/// Backed by a concurrent map, so the registry itself may be shared across
/// threads without an external lock. The guards returned by
/// [`get_or_create`] and [`get`] hold a shard lock; drop them before
/// calling back into the registry for the same key.
///
/// [`get_or_create`]: SessionManager::get_or_create
/// [`get`]: SessionManager::get
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: DashMap<SessionKey, SessionEntry>,
}

impl SessionManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session registered under `key`, creating it with
    /// `config` if absent. Idempotent: an existing session keeps its
    /// original configuration.
    pub fn get_or_create(
        &self,
        key: impl Into<SessionKey>,
        config: BufferConfig,
    ) -> RefMut<'_, SessionKey, SessionEntry> {
        self.sessions
            .entry(key.into())
            .or_insert_with(|| SessionEntry::new(config))
    }

    /// Returns the session registered under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &SessionKey) -> Option<Ref<'_, SessionKey, SessionEntry>> {
        self.sessions.get(key)
    }

    /// Deregisters and returns the session. No implicit flush happens;
    /// unflushed text is discarded with the returned entry unless the
    /// caller reads it first.
    pub fn remove(&self, key: &SessionKey) -> Option<SessionEntry> {
        let removed = self.sessions.remove(key).map(|(_, entry)| entry);
        if removed.is_some() {
            tracing::debug!(session = %key, "session removed");
        }
        removed
    }

    /// Deregisters every session.
    pub fn clear(&self) {
        self.sessions.clear();
    }

    /// Records transport liveness for `key`; no-op for unknown keys.
    pub fn set_streaming(&self, key: &SessionKey, streaming: bool) {
        if let Some(mut entry) = self.sessions.get_mut(key) {
            entry.set_streaming(streaming);
        }
    }

    /// Read-only snapshot of the session under `key`, or a default
    /// "not streaming" snapshot when the key is unregistered.
    #[must_use]
    pub fn state_of(&self, key: &SessionKey) -> SessionSnapshot {
        self.sessions
            .get(key)
            .map(|entry| entry.snapshot())
            .unwrap_or_default()
    }

    /// Whether a session is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Keys of all registered sessions, in no particular order.
    #[must_use]
    pub fn active_keys(&self) -> Vec<SessionKey> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }
}
