//! Conflate - line-preserving key-value configuration manager
//!
//! Conflate reads a flat `key = value` text file into an in-memory mapping,
//! lets the caller change that mapping, and writes it back while leaving
//! comments, ordering and unrelated lines in place.

pub mod cli;
pub mod line;
pub mod literal;
pub mod logging;
pub mod manager;
pub mod prompt;
pub mod value;

pub use line::Operators;
pub use literal::{parse_literal, LiteralError};
pub use manager::{
    ConfigManager, ConfigManagerBuilder, InitialConfig, LoadOptions, LoadReport, MalformedValue,
    SaveReport,
};
pub use prompt::{ConfirmCreation, SilentConfirm, TerminalConfirm};
pub use value::{ConfigMap, Value};

use std::path::PathBuf;

/// Result type alias for command-line operations
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to Conflate operations
#[derive(thiserror::Error, Debug)]
pub enum ConflateError {
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Creation of missing config file '{}' was declined", path.display())]
    CreationDeclined { path: PathBuf },

    #[error("Invalid operator: {message}")]
    InvalidOperator { message: String },

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Configuration was not in an acceptable format: expected a list of keys or a mapping, got {found}")]
    InvalidInitialConfig { found: String },

    #[error("Malformed value for property '{key}': {source}")]
    MalformedValue {
        key: String,
        #[source]
        source: LiteralError,
    },
}
