use std::{
    fmt,
    path::{Path, PathBuf},
    result,
};

use thiserror::Error;
use toml::Value;

/// Errors surfaced by the typed preference layer.
///
/// Failures of the underlying store itself are not modelled here; they stay
/// the concern of the [`Backend`](crate::backend::Backend) implementation.
#[derive(Error, Debug)]
pub enum PrefsError {
    /// A raw key name was rejected at construction time.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey {
        /// The rejected raw name
        key: String,
        /// Why the name is not allowed
        reason: &'static str,
    },

    /// The key has neither a stored value nor a registered default.
    #[error("no value or default registered for key '{key}'")]
    Missing {
        /// The key that was read
        key: String,
    },

    /// The stored value does not decode as the type the key declares.
    #[error("type mismatch at '{key}': expected {expected_type}, got {actual_value:?}")]
    TypeMismatch {
        /// The key whose value failed to decode
        key: String,
        /// The expected type name
        expected_type: &'static str,
        /// The raw value found in the store
        actual_value: Value,
    },

    /// A typed value could not be encoded into a raw store value.
    #[error("failed to serialize value for '{key}': {details}")]
    Serialization {
        /// The key being written
        key: String,
        /// Serialization error details
        details: String,
    },

    /// TOML parsing error with location context
    #[error("failed to parse TOML at '{location}': {details}")]
    TomlParseError {
        /// Location of TOML being parsed (file path or "string")
        location: String,
        /// Parse error details
        details: String,
    },

    /// JSON parsing error with location context
    #[error("failed to parse JSON at '{location}': {details}")]
    JsonParseError {
        /// Location of JSON being parsed (file path or "string")
        location: String,
        /// Parse error details
        details: String,
    },

    /// A defaults resource parsed, but its root is not a key/value table.
    #[error("defaults resource '{location}' is not a table")]
    NotATable {
        /// Location of the offending resource
        location: String,
    },

    /// I/O operation error
    #[error("I/O error on '{path}': {details}")]
    IoError {
        /// Path where I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },
}

/// A specialized `Result` type for preference operations.
pub type Result<T> = result::Result<T, PrefsError>;

impl PrefsError {
    /// Creates a TOML parsing error with optional file path context.
    pub fn toml_parse(error: impl fmt::Display, path: Option<&Path>) -> Self {
        PrefsError::TomlParseError {
            location: location_of(path),
            details: error.to_string(),
        }
    }

    /// Creates a JSON parsing error with optional file path context.
    pub fn json_parse(error: impl fmt::Display, path: Option<&Path>) -> Self {
        PrefsError::JsonParseError {
            location: location_of(path),
            details: error.to_string(),
        }
    }

    /// Creates an I/O error with file path context.
    pub fn io(error: impl fmt::Display, path: &Path) -> Self {
        PrefsError::IoError {
            path: path.to_path_buf(),
            details: error.to_string(),
        }
    }
}

fn location_of(path: Option<&Path>) -> String {
    match path {
        Some(p) => {
            let clean_path = p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
            clean_path.to_string_lossy().to_string()
        }
        None => "string".to_string(),
    }
}
