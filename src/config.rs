//! Configuration management for serterm.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.serterm/config.toml`
//! - Default filling for keys missing from an existing file
//! - Validation of the address-token pattern at startup
//!
//! # Configuration File
//!
//! The configuration file is located at `~/.serterm/config.toml`:
//!
//! ```toml
//! version = 1
//!
//! # Binary carrying the debug symbols
//! elfFile = "build/app.elf"
//!
//! # addr2line executable of the target toolchain
//! toolchain = "/opt/xtensa-esp32-elf/bin/xtensa-esp32-elf-addr2line"
//!
//! # Address token pattern
//! reFilter = "0x4[0-9a-f]{7}"
//!
//! # Flags placed before the ELF path
//! cmdArg = "-pfiaC -e"
//!
//! # "ignore" or "replace" for invalid UTF-8
//! decodeErrors = "ignore"
//!
//! # Color of inserted translations
//! highlight = "#ffa000"
//! ```
//!
//! Keys that are absent are filled from the defaults; keys that are present
//! are never overwritten.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::session::{SessionOptions, DEFAULT_CHUNK_SIZE};
use crate::core::symbols::DEFAULT_PATTERN;
use crate::core::term::state::YELLOW;
use crate::core::term::{Color, DecodePolicy};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid address pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Could not determine config path")]
    NoHome,
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub version: u32,
    /// Binary with debug symbols passed to the resolver
    pub elf_file: String,
    /// Resolver executable
    pub toolchain: String,
    /// Address token pattern
    pub re_filter: String,
    /// Resolver flags, placed before the ELF path
    pub cmd_arg: String,
    /// Handling of invalid UTF-8 in the stream
    pub decode_errors: DecodePolicy,
    /// Longest incomplete escape sequence carried between chunks.
    /// Unset means no limit.
    pub max_sequence_len: Option<usize>,
    /// Color of inserted translations
    pub highlight: Color,
    /// Bytes read per chunk
    pub chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            elf_file: "hello.elf".to_string(),
            toolchain: "/xtensa-esp32-elf-addr2line".to_string(),
            re_filter: DEFAULT_PATTERN.to_string(),
            cmd_arg: "-pfiaC -e".to_string(),
            decode_errors: DecodePolicy::Ignore,
            max_sequence_len: None,
            highlight: YELLOW,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file yields the defaults and is written out so the user
    /// has something to edit. An existing file lacking keys is rewritten
    /// with those keys filled in.
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let path = Self::get_config_path().ok_or(ConfigError::NoHome)?;
        let (config, complete) = Self::load_from(&path)?;
        if !complete {
            if let Err(e) = config.save_to(&path) {
                tracing::warn!("{}", e);
            }
        }
        Ok(config)
    }

    /// Load configuration from `path`.
    ///
    /// Returns the config and whether the file already held every key.
    pub fn load_from(path: &Path) -> Result<(Self, bool), ConfigError> {
        if !path.exists() {
            return Ok((Self::default(), false));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;

        let complete = Self::has_all_keys(&content, &config)?;
        Ok((config, complete))
    }

    /// Whether the raw file mentions every key the serialized config has
    fn has_all_keys(content: &str, config: &Config) -> Result<bool, ConfigError> {
        let present: toml::Table = toml::from_str(content).unwrap_or_default();
        let full = toml::Value::try_from(config)?;
        Ok(full
            .as_table()
            .map_or(true, |table| table.keys().all(|key| present.contains_key(key))))
    }

    /// Reject values that would disable the pipeline
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sequence_len == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "maxSequenceLen",
                value: "0".to_string(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "chunkSize",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get config file path
    pub fn get_config_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }

    /// Compile the address-token pattern
    pub fn address_pattern(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.re_filter).map_err(|source| ConfigError::InvalidPattern {
            pattern: self.re_filter.clone(),
            source,
        })
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            decode: self.decode_errors,
            max_pending: self.max_sequence_len,
            chunk_size: self.chunk_size,
        }
    }
}

/// `~/.serterm`
pub fn data_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".serterm"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("serterm-test-{}-{}", std::process::id(), name));
        let _ = fs::create_dir_all(&dir);
        dir.join("config.toml")
    }

    #[test]
    fn test_missing_keys_filled_from_defaults() {
        let config: Config = toml::from_str(r#"elfFile = "fw.elf""#).unwrap();

        assert_eq!(config.elf_file, "fw.elf");
        assert_eq!(config.toolchain, "/xtensa-esp32-elf-addr2line");
        assert_eq!(config.re_filter, "0x4[0-9a-f]{7}");
        assert_eq!(config.cmd_arg, "-pfiaC -e");
        assert_eq!(config.decode_errors, DecodePolicy::Ignore);
    }

    #[test]
    fn test_camel_case_keys() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        for key in ["elfFile", "toolchain", "reFilter", "cmdArg", "decodeErrors"] {
            assert!(text.contains(key), "missing {} in {}", key, text);
        }
    }

    #[test]
    fn test_load_missing_file() {
        let path = temp_path("missing").with_file_name("absent.toml");
        let (config, complete) = Config::load_from(&path).unwrap();

        assert_eq!(config, Config::default());
        assert!(!complete);
    }

    #[test]
    fn test_partial_file_is_incomplete_but_kept() {
        let path = temp_path("partial");
        fs::write(&path, "toolchain = \"/opt/bin/addr2line\"\ndecodeErrors = \"replace\"\n").unwrap();

        let (config, complete) = Config::load_from(&path).unwrap();
        assert!(!complete);
        assert_eq!(config.toolchain, "/opt/bin/addr2line");
        assert_eq!(config.decode_errors, DecodePolicy::Replace);

        config.save_to(&path).unwrap();
        let (reloaded, complete) = Config::load_from(&path).unwrap();
        assert!(complete);
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let path = temp_path("invalid");
        fs::write(&path, "elfFile = [").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_sequence_cap_rejected() {
        let path = temp_path("zero-cap");
        fs::write(&path, "maxSequenceLen = 0\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue { key: "maxSequenceLen", .. })
        ));

        fs::write(&path, "maxSequenceLen = 16\n").unwrap();
        let (config, _) = Config::load_from(&path).unwrap();
        assert_eq!(config.max_sequence_len, Some(16));
    }

    #[test]
    fn test_highlight_is_hex_string() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(text.contains("highlight = \"#ffa000\""), "{}", text);

        let config: Config = toml::from_str("highlight = \"#2196f3\"").unwrap();
        assert_eq!(config.highlight, Color::new(0x21, 0x96, 0xf3));
        assert!(toml::from_str::<Config>("highlight = \"yellow\"").is_err());
    }

    #[test]
    fn test_invalid_pattern_fails_fast() {
        let config = Config {
            re_filter: "0x4[0-9a-f".to_string(),
            ..Config::default()
        };

        assert!(matches!(config.address_pattern(), Err(ConfigError::InvalidPattern { .. })));
        assert!(Config::default().address_pattern().is_ok());
    }

    #[test]
    fn test_session_options() {
        let config = Config {
            max_sequence_len: Some(10),
            chunk_size: 64,
            ..Config::default()
        };
        let options = config.session_options();

        assert_eq!(options.max_pending, Some(10));
        assert_eq!(options.chunk_size, 64);
    }
}
