//! Configuration Loading
//!
//! Flush thresholds come from three layers, weakest first: built-in defaults,
//! an optional TOML file under the user's config directory, and environment
//! variables for per-invocation overrides. Surfaces embedding the core call
//! [`load_config`] once at startup and pass the result to the sessions they
//! open.
//!
//! # Environment Variables
//!
//! - `INKSTREAM_MIN_FLUSH`: pending bytes before a flush fires outside a
//!   code block
//! - `INKSTREAM_MAX_FLUSH`: pending bytes before a flush fires inside a
//!   code block
//! - `INKSTREAM_CODE_BLOCKS`: `true`/`false` (also `1`/`0`, `on`/`off`) to
//!   toggle the block-aware policy
//!
//! A configuration where `max_flush_bytes` does not exceed `min_flush_bytes`
//! is accepted unchanged (code blocks then flush before equivalent prose)
//! but logged, since it is usually a mistake.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::BufferConfig;

const ENV_MIN_FLUSH: &str = "INKSTREAM_MIN_FLUSH";
const ENV_MAX_FLUSH: &str = "INKSTREAM_MAX_FLUSH";
const ENV_CODE_BLOCKS: &str = "INKSTREAM_CODE_BLOCKS";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML.
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// An environment variable held an unparsable value.
    #[error("invalid value {value:?} for {variable}")]
    Env {
        /// Variable that was being parsed.
        variable: &'static str,
        /// The offending value.
        value: String,
    },
}

/// On-disk configuration model; every field is optional and missing fields
/// fall back to the built-in defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Overrides [`BufferConfig::min_flush_bytes`].
    pub min_flush_bytes: Option<usize>,
    /// Overrides [`BufferConfig::max_flush_bytes`].
    pub max_flush_bytes: Option<usize>,
    /// Overrides [`BufferConfig::code_block_aware`].
    pub code_block_aware: Option<bool>,
}

impl ConfigFile {
    fn merge_into(self, mut config: BufferConfig) -> BufferConfig {
        if let Some(value) = self.min_flush_bytes {
            config.min_flush_bytes = value;
        }
        if let Some(value) = self.max_flush_bytes {
            config.max_flush_bytes = value;
        }
        if let Some(value) = self.code_block_aware {
            config.code_block_aware = value;
        }
        config
    }
}

/// Default config file location: `<config dir>/inkstream/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("inkstream").join("config.toml"))
}

/// Loads configuration from the default file location (if the file exists)
/// and the environment, over the built-in defaults.
pub fn load_config() -> Result<BufferConfig, ConfigError> {
    let mut config = BufferConfig::default();
    if let Some(path) = default_config_path() {
        if path.exists() {
            config = read_config_file(&path)?.merge_into(config);
        }
    }
    let config = apply_env_overrides(config)?;
    warn_on_inverted_thresholds(&config);
    Ok(config)
}

/// Loads configuration from an explicit file path and the environment, over
/// the built-in defaults. Unlike [`load_config`], a missing file is an error.
pub fn load_config_from_path(path: &Path) -> Result<BufferConfig, ConfigError> {
    let config = read_config_file(path)?.merge_into(BufferConfig::default());
    let config = apply_env_overrides(config)?;
    warn_on_inverted_thresholds(&config);
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides(mut config: BufferConfig) -> Result<BufferConfig, ConfigError> {
    if let Ok(value) = std::env::var(ENV_MIN_FLUSH) {
        config.min_flush_bytes = parse_size(ENV_MIN_FLUSH, &value)?;
    }
    if let Ok(value) = std::env::var(ENV_MAX_FLUSH) {
        config.max_flush_bytes = parse_size(ENV_MAX_FLUSH, &value)?;
    }
    if let Ok(value) = std::env::var(ENV_CODE_BLOCKS) {
        config.code_block_aware = parse_toggle(ENV_CODE_BLOCKS, &value)?;
    }
    Ok(config)
}

fn parse_size(variable: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        variable,
        value: value.to_string(),
    })
}

fn parse_toggle(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::Env {
            variable,
            value: value.to_string(),
        }),
    }
}

/// `max <= min` is permitted but surprising: code-block content would flush
/// before equivalent prose. Flagged in logs only.
fn warn_on_inverted_thresholds(config: &BufferConfig) {
    if config.max_flush_bytes <= config.min_flush_bytes {
        tracing::warn!(
            min_flush_bytes = config.min_flush_bytes,
            max_flush_bytes = config.max_flush_bytes,
            "max_flush_bytes does not exceed min_flush_bytes; code blocks will flush before prose"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, OnceLock};

    /// Serializes tests that touch process environment variables.
    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(Mutex::default)
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_file_overrides_defaults_field_by_field() {
        let _guard = env_lock().lock().unwrap();
        let file = write_config("min_flush_bytes = 16\ncode_block_aware = false\n");

        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.min_flush_bytes, 16);
        assert_eq!(config.max_flush_bytes, 500);
        assert!(!config.code_block_aware);
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let _guard = env_lock().lock().unwrap();
        let file = write_config("");

        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config, BufferConfig::default());
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let _guard = env_lock().lock().unwrap();
        let file = write_config("min_flush_bytes = \"lots\"\n");

        let err = load_config_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let _guard = env_lock().lock().unwrap();
        let err = load_config_from_path(Path::new("/nonexistent/inkstream.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_env_overrides_file() {
        let _guard = env_lock().lock().unwrap();
        let file = write_config("min_flush_bytes = 16\n");

        std::env::set_var(ENV_MIN_FLUSH, "24");
        std::env::set_var(ENV_CODE_BLOCKS, "off");
        let result = load_config_from_path(file.path());
        std::env::remove_var(ENV_MIN_FLUSH);
        std::env::remove_var(ENV_CODE_BLOCKS);

        let config = result.unwrap();
        assert_eq!(config.min_flush_bytes, 24);
        assert!(!config.code_block_aware);
    }

    #[test]
    fn test_unparsable_env_value_is_an_error() {
        let _guard = env_lock().lock().unwrap();
        let file = write_config("");

        std::env::set_var(ENV_MAX_FLUSH, "many");
        let result = load_config_from_path(file.path());
        std::env::remove_var(ENV_MAX_FLUSH);

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Env { variable, .. } if variable == ENV_MAX_FLUSH
        ));
    }

    #[test]
    fn test_inverted_thresholds_load_unchanged() {
        let _guard = env_lock().lock().unwrap();
        let file = write_config("min_flush_bytes = 100\nmax_flush_bytes = 10\n");

        // Only a warning is logged; the values pass through untouched.
        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.min_flush_bytes, 100);
        assert_eq!(config.max_flush_bytes, 10);
    }
}
