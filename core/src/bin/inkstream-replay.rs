//! Inkstream Replay
//!
//! Debug harness for the buffering core: feeds a Markdown file (or stdin)
//! through a scripted source in fixed-size chunks, exactly as a transport
//! would, and prints every flush increment with its boundaries marked. Useful
//! for eyeballing how a given document streams: where prose is released,
//! where code blocks hold text back, and what the incomplete-block preview
//! shows along the way.
//!
//! # Usage
//!
//! ```bash
//! # Replay a file
//! inkstream-replay notes.md
//!
//! # Replay stdin
//! cat notes.md | inkstream-replay
//!
//! # Smaller chunks and verbose logging
//! INKSTREAM_CHUNK_BYTES=8 RUST_LOG=trace inkstream-replay notes.md
//! ```
//!
//! # Environment Variables
//!
//! - `INKSTREAM_CHUNK_BYTES`: chunk size for the replay (default: 16)
//! - `INKSTREAM_MIN_FLUSH` / `INKSTREAM_MAX_FLUSH` / `INKSTREAM_CODE_BLOCKS`:
//!   flush configuration overrides
//! - `RUST_LOG`: log level (trace, debug, info, warn, error)

use std::io::Read;
use std::sync::Arc;

use tokio_stream::StreamExt;
use tracing::info;

use inkstream_core::{
    config, DriverUpdate, ScriptedSource, SessionKey, SessionManager, StreamDriver, StreamSource,
};

/// Chunk size for the replay, in bytes (char-boundary aligned).
fn chunk_size_from_env() -> usize {
    std::env::var("INKSTREAM_CHUNK_BYTES")
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .filter(|&size| size > 0)
        .unwrap_or(16)
}

/// Splits `text` into chunks of roughly `size` bytes without breaking
/// characters apart.
fn split_chunks(text: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if current.len() >= size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn read_input() -> anyhow::Result<String> {
    match std::env::args().nth(1) {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let text = read_input()?;
    let chunk_size = chunk_size_from_env();
    let buffer_config = config::load_config()?;
    info!(
        chunk_bytes = chunk_size,
        min_flush_bytes = buffer_config.min_flush_bytes,
        max_flush_bytes = buffer_config.max_flush_bytes,
        "replay starting"
    );

    let manager = Arc::new(SessionManager::new());
    let key = SessionKey::from("replay");

    let source = ScriptedSource::from_chunks(split_chunks(&text, chunk_size));
    let receiver = source.open_stream().await?;
    let driver = StreamDriver::new(key.clone(), Arc::clone(&manager), buffer_config, receiver);

    let mut flushes = 0u32;
    let mut updates = driver.spawn();
    while let Some(update) = updates.next().await {
        match update {
            DriverUpdate::Content { emitted, .. } => {
                if !emitted.is_empty() {
                    flushes += 1;
                    println!("--- flush #{flushes} ({} bytes) ---", emitted.len());
                    println!("{emitted}");
                    let state = manager.state_of(&key);
                    if let Some(preview) = state.incomplete_block {
                        println!(
                            "    [open {} block, {} preview bytes held back]",
                            if preview.language.is_empty() {
                                "untagged"
                            } else {
                                preview.language.as_str()
                            },
                            preview.content.len()
                        );
                    }
                }
            }
            DriverUpdate::Metadata { payload } => {
                println!("--- metadata: {payload} ---");
            }
            DriverUpdate::Completed { full_text } => {
                let state = manager.state_of(&key);
                println!("--- complete: {} bytes total ---", full_text.len());
                println!(
                    "    flushed {} bytes in {flushes} increments, {} bytes never flushed",
                    state.content.len(),
                    full_text.len() - state.content.len()
                );
            }
            DriverUpdate::Failed { error, .. } => {
                eprintln!("stream failed: {error}");
            }
        }
    }

    Ok(())
}
