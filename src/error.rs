//! Error types for tspipe
//!
//! Uses `thiserror` for library errors. The binary wraps these in `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::ports::FsError;

/// Result type alias for tspipe operations
pub type TspipeResult<T> = Result<T, TspipeError>;

/// Main error type for tspipe operations
#[derive(Error, Debug)]
pub enum TspipeError {
    /// A file was requested for a target that has no compilation context.
    ///
    /// Every active target gets a context before any file is processed, so
    /// reaching this is an internal invariant violation.
    #[error("no compilation context for target \"{target}\"")]
    MissingContext { target: String },

    /// `compile`/`watch` called before `set_options`
    #[error("compiler options have not been set")]
    NotConfigured,

    /// Project configuration could not be parsed
    #[error("invalid configuration in {file}: {message}")]
    Config { file: PathBuf, message: String },

    /// An addon module was discovered but could not be loaded
    #[error("failed to load addon '{name}' from {path}: {message}")]
    AddonLoad {
        name: String,
        path: PathBuf,
        message: String,
    },

    /// An addon callback failed while running inside the pipeline
    #[error("addon '{name}' failed: {message}")]
    Addon { name: String, message: String },

    /// A file watcher could not be registered
    #[error("failed to watch {path}: {message}")]
    Watch { path: PathBuf, message: String },

    /// File system port error
    #[error("{0}")]
    Fs(#[from] FsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TspipeError {
    /// Shorthand for an addon-originated failure.
    pub fn addon(name: impl Into<String>, message: impl Into<String>) -> Self {
        TspipeError::Addon {
            name: name.into(),
            message: message.into(),
        }
    }
}
