//! Error types for the records crate.
//!
//! Everything here is fatal for the run: a malformed input line or a bad
//! configuration value means the batch cannot produce trustworthy output.

use thiserror::Error;

/// Errors raised while reading records or configuration.
#[derive(Error, Debug)]
pub enum RecordError {
    /// I/O error occurred while reading a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line in an input file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    Parse {
        file: String,
        line: usize,
        reason: String,
    },

    /// Expected number of fields in a line doesn't match actual
    #[error("Expected {expected} fields but found {found} at line {line} in {file}")]
    FieldCount {
        file: String,
        expected: usize,
        found: usize,
        line: usize,
    },

    /// A numeric field held something that is not an integer
    #[error("Invalid value for {field} at line {line} in {file}: {value:?}")]
    InvalidNumber {
        file: String,
        line: usize,
        field: &'static str,
        value: String,
    },

    /// Unknown configuration key or unusable value
    #[error("Invalid configuration for {key}: {reason}")]
    Config { key: String, reason: String },

    /// Configuration file is not valid TOML
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, RecordError>;
