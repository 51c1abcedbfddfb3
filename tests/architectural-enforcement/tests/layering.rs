//! Layering rules for the workspace.
//!
//! The buffering core is consumed by surfaces we do not control, so two
//! properties are enforced mechanically over the source tree:
//!
//! 1. **Headless core**: `core/` must not import any UI framework. Rendering
//!    belongs to the surfaces.
//! 2. **No panicking shortcuts**: non-test code in `core/` must propagate
//!    errors instead of unwrapping. The buffer contract says no operation
//!    fails for any input; a stray unwrap would break that silently.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// UI crates the core must never touch.
const UI_CRATES: [&str; 3] = ["ratatui", "crossterm", "ratatui_core"];

/// Panicking constructs banned outside test code.
const PANIC_PATTERNS: [&str; 4] = [".unwrap()", ".expect(", "panic!(", "unreachable!("];

fn core_src() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../core/src")
}

fn rust_sources(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|entry| entry.into_path())
        .collect()
}

/// Everything before the first `#[cfg(test)]` marker; test modules sit at
/// the bottom of each source file.
fn non_test_portion(source: &str) -> &str {
    source.split("#[cfg(test)]").next().unwrap_or(source)
}

#[test]
fn test_core_is_headless() {
    let sources = rust_sources(&core_src());
    assert!(!sources.is_empty(), "core sources not found");

    for path in sources {
        let source = fs::read_to_string(&path).unwrap();
        for ui_crate in UI_CRATES {
            assert!(
                !source.contains(&format!("use {ui_crate}")),
                "{} imports UI crate {ui_crate}",
                path.display()
            );
        }
    }
}

#[test]
fn test_core_non_test_code_does_not_panic() {
    for path in rust_sources(&core_src()) {
        let source = fs::read_to_string(&path).unwrap();
        let production = non_test_portion(&source);
        for pattern in PANIC_PATTERNS {
            assert!(
                !production.contains(pattern),
                "{} uses {pattern} outside tests",
                path.display()
            );
        }
    }
}

#[test]
fn test_core_does_not_block_on_std_io() {
    // The buffering path must never wait on I/O; only the config loader
    // (startup-time, synchronous by design) and the replay binary may read
    // files or stdin.
    let allowed = ["config.rs", "inkstream-replay.rs"];

    for path in rust_sources(&core_src()) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if allowed.contains(&name.as_str()) {
            continue;
        }

        let source = fs::read_to_string(&path).unwrap();
        let production = non_test_portion(&source);
        assert!(
            !production.contains("std::fs") && !production.contains("std::io"),
            "{} performs blocking I/O",
            path.display()
        );
    }
}
