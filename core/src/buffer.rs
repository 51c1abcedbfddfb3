//! Session Buffer
//!
//! One [`StreamBuffer`] owns a single stream's accumulated text and decides,
//! chunk by chunk, how much of it is safe to hand to a renderer. Outside a
//! fenced code block the buffer optimizes for latency: once a small threshold
//! of pending text has built up, the entire unflushed suffix is released.
//! Inside a fenced code block it optimizes for stability: pending text is
//! released in larger, boundary-aligned increments so the renderer is not
//! asked to repeatedly re-paint a half-open fence, and the not-yet-safe
//! remainder is exposed as an [`incomplete_code_block`] preview instead.
//!
//! # Design Philosophy
//!
//! The buffer is an append-only log plus a forward-only cursor. `content`
//! grows on every [`push`] and is never rewritten (only [`reset`] clears it as
//! a whole); `flushed` marks the prefix already handed out and only ever moves
//! toward the end. Everything the caller has received so far is exactly
//! `content[..flushed]`: increments concatenate losslessly, with no
//! reordering and no duplication.
//!
//! Fence tracking is chunk-local by design: a marker split across two chunks
//! (two backticks in one, the third in the next) is not detected. Chunk
//! granularity is controlled by the transport and is typically token-sized,
//! which keeps markers intact in practice.
//!
//! [`push`]: StreamBuffer::push
//! [`reset`]: StreamBuffer::reset
//! [`incomplete_code_block`]: StreamBuffer::incomplete_code_block

use serde::{Deserialize, Serialize};

use crate::boundary;

/// Opening/closing marker of a Markdown fenced code block.
const FENCE: &str = "```";

/// Flush-policy configuration for a session buffer.
///
/// Thresholds are measured in bytes of UTF-8. `max_flush_bytes` is expected
/// to exceed `min_flush_bytes`; the buffer does not enforce the relationship
/// (an inverted pair makes code-block content flush before equivalent prose).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Pending bytes required before a flush fires outside a code block.
    pub min_flush_bytes: usize,
    /// Pending bytes required before a flush fires inside a code block.
    pub max_flush_bytes: usize,
    /// Enables fence tracking and the block-aware flush policy. When false
    /// the buffer never enters a code block and always applies the prose
    /// policy.
    pub code_block_aware: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            min_flush_bytes: 50,
            max_flush_bytes: 500,
            code_block_aware: true,
        }
    }
}

/// Preview of an in-progress fenced code block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockPreview {
    /// Language label captured from the opening fence; may be empty.
    pub language: String,
    /// Held-back block content, without the line assumed to be the fence.
    pub content: String,
}

/// Accumulates one stream's text and meters it out at safe boundaries.
#[derive(Clone, Debug, Default)]
pub struct StreamBuffer {
    /// Append-only log of everything received.
    content: String,
    /// Byte offset of the prefix already handed to the caller.
    flushed: usize,
    /// True between an opening and a closing fence marker.
    in_code_block: bool,
    /// Label from the opening fence; cleared when the block closes.
    code_block_language: String,
    /// Unflushed remainder recorded at the last partial flush inside a
    /// block. Updated at flush time only, so it does not grow as further
    /// chunks arrive.
    held_back: String,
    config: BufferConfig,
}

impl StreamBuffer {
    /// Creates an empty buffer with the given flush configuration.
    #[must_use]
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The buffer's flush configuration.
    #[must_use]
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Appends a chunk, updates fence state, and applies the flush policy.
    ///
    /// Returns the released increment when the policy fires, otherwise an
    /// empty string. Never fails, for any input.
    pub fn push(&mut self, chunk: &str) -> String {
        self.content.push_str(chunk);
        if self.config.code_block_aware {
            self.track_fences(chunk);
        }

        let pending = self.content.len() - self.flushed;
        let threshold = if self.in_code_block {
            self.config.max_flush_bytes
        } else {
            self.config.min_flush_bytes
        };

        if pending >= threshold {
            self.flush()
        } else {
            String::new()
        }
    }

    /// Releases pending text, honoring the current structural state.
    ///
    /// Outside a code block the entire unflushed suffix is released. Inside
    /// one, the suffix is truncated at the rightmost safe boundary and the
    /// remainder is held back for the next flush. Returns empty (and mutates
    /// nothing) when nothing is pending.
    pub fn flush(&mut self) -> String {
        if self.flushed == self.content.len() {
            return String::new();
        }

        let pending = &self.content[self.flushed..];
        if self.in_code_block {
            let cut = boundary::safe_cut_point(pending);
            let emitted = pending[..cut].to_string();
            self.held_back = pending[cut..].to_string();
            self.flushed += cut;
            tracing::trace!(
                emitted_bytes = emitted.len(),
                held_back_bytes = self.held_back.len(),
                "partial code-block flush"
            );
            emitted
        } else {
            let emitted = pending.to_string();
            self.flushed = self.content.len();
            self.held_back.clear();
            tracing::trace!(emitted_bytes = emitted.len(), "full flush");
            emitted
        }
    }

    /// The entire accumulated text, flushed or not. Callers that tear a
    /// session down without a final flush read the tail through this.
    #[must_use]
    pub fn full_text(&self) -> &str {
        &self.content
    }

    /// The prefix already handed to the caller.
    #[must_use]
    pub fn flushed_text(&self) -> &str {
        &self.content[..self.flushed]
    }

    /// Total accumulated length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether nothing has been received since creation or the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Bytes accumulated but not yet released.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.content.len() - self.flushed
    }

    /// Whether the buffer is currently inside a fenced code block.
    #[must_use]
    pub fn is_in_code_block(&self) -> bool {
        self.in_code_block
    }

    /// Language label of the open code block; empty outside a block or when
    /// the fence carried no label.
    #[must_use]
    pub fn code_block_language(&self) -> &str {
        &self.code_block_language
    }

    /// Preview of the open code block's held-back content, for renderers
    /// that show a "so far" view between flushes.
    ///
    /// Returns `None` outside a block and before the first partial flush
    /// within one. The fragment's first line is taken to be the opening
    /// fence and is dropped; after a second partial flush inside the same
    /// block the fragment starts with real content, which is dropped all the
    /// same.
    #[must_use]
    pub fn incomplete_code_block(&self) -> Option<CodeBlockPreview> {
        if !self.in_code_block || self.held_back.is_empty() {
            return None;
        }
        let content = match self.held_back.split_once('\n') {
            Some((_, rest)) => rest.to_string(),
            None => String::new(),
        };
        Some(CodeBlockPreview {
            language: self.code_block_language.clone(),
            content,
        })
    }

    /// Clears all state back to initial values; the configuration is kept.
    pub fn reset(&mut self) {
        self.content.clear();
        self.flushed = 0;
        self.in_code_block = false;
        self.code_block_language.clear();
        self.held_back.clear();
    }

    /// Chunk-local fence detection, at most one state transition per push.
    fn track_fences(&mut self, chunk: &str) {
        if self.in_code_block {
            if chunk.contains(FENCE) {
                tracing::debug!(language = %self.code_block_language, "code block closed");
                self.in_code_block = false;
                self.code_block_language.clear();
                self.held_back.clear();
            }
        } else if let Some(pos) = chunk.find(FENCE) {
            self.in_code_block = true;
            self.code_block_language = chunk[pos + FENCE.len()..]
                .chars()
                .take_while(|c| !c.is_whitespace() && *c != '`')
                .collect();
            tracing::debug!(language = %self.code_block_language, "code block opened");
        }
    }
}
