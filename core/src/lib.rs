//! Inkstream Core - Streaming-Markdown Buffering for Incremental Model Output
//!
//! This crate decides, token by token, how much of an accumulating model
//! reply is safe to hand to a renderer without corrupting in-progress
//! Markdown structure (fenced code blocks in particular), and multiplexes
//! any number of concurrent streams behind opaque session keys. It is
//! completely independent of any UI framework: it can feed a TUI, a web
//! surface, a native view, or run headless under test.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Transport                              │
//! │        (SSE, WebSocket, local runner, behind StreamSource)       │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ SourceEvent
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          StreamDriver                            │
//! │   routes chunks into the session, republishes DriverUpdate       │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ push(chunk)
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         SessionManager                           │
//! │  ┌────────────────┐  ┌────────────────┐                          │
//! │  │  StreamBuffer  │  │  StreamBuffer  │  ...  (one per key)      │
//! │  │  fence state   │  │  fence state   │                          │
//! │  └───────┬────────┘  └────────────────┘                          │
//! │          │ safe_cut_point (inside fenced blocks)                 │
//! │          ▼                                                       │
//! │     boundary scanner                                             │
//! └──────────────────────────────────────────────────────────────────┘
//!                                 │ increment / preview
//!                                 ▼
//!                         caller-visible content
//! ```
//!
//! # Key Types
//!
//! - [`StreamBuffer`]: one stream's accumulated text, flush cursor, and
//!   fence state; the add/flush policy lives here
//! - [`SessionManager`]: keyed registry of independent session buffers
//! - [`StreamDriver`]: adapter from a transport receiver to a session
//! - [`SourceEvent`] / [`DriverUpdate`]: what goes in and what comes out
//! - [`BufferConfig`]: flush thresholds and the block-awareness toggle
//!
//! # Quick Start
//!
//! ```
//! use inkstream_core::{BufferConfig, SessionKey, SessionManager};
//!
//! let manager = SessionManager::new();
//! let key = SessionKey::from("reply-1");
//!
//! let increment = {
//!     let mut session = manager.get_or_create(key.clone(), BufferConfig::default());
//!     session.buffer_mut().push("The answer is 42. More to come")
//! };
//! // Below the prose threshold: nothing released yet.
//! assert!(increment.is_empty());
//!
//! // Read-only view for rendering.
//! let state = manager.state_of(&key);
//! assert_eq!(state.buffer, "The answer is 42. More to come");
//! ```
//!
//! # Module Overview
//!
//! - [`boundary`]: safe cut-point scanning (pure, stateless)
//! - [`buffer`]: session buffer with the dual flush policy
//! - [`manager`]: keyed session registry and snapshots
//! - [`driver`]: transport-to-session adapter
//! - [`source`]: stream source seam and the scripted in-process source
//! - [`config`]: file/env configuration loading
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on ratatui, crossterm, or any other
//! UI framework. It's pure buffering logic that can be used anywhere.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod boundary;
pub mod buffer;
pub mod config;
pub mod driver;
pub mod manager;
pub mod source;

// Re-exports for convenience
pub use boundary::safe_cut_point;
pub use buffer::{BufferConfig, CodeBlockPreview, StreamBuffer};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigFile,
};
pub use driver::{DriverUpdate, StreamDriver};
pub use manager::{SessionEntry, SessionKey, SessionManager, SessionSnapshot};
pub use source::{ScriptedSource, SourceEvent, StreamSource};
