//! Error types for data set access.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while opening or reading a data set.
#[derive(Debug, Error)]
pub enum DataSetError {
    /// The data set file does not exist.
    #[error("Data set file not found: {0}")]
    NotFound(PathBuf),

    /// A `data_set_format` value outside the supported allow-list.
    #[error("Invalid data_set_format '{0}'. Choose from available formats: ['bigann', 'jsonl']")]
    UnknownFormat(String),

    /// The file exists but its contents do not match the declared layout.
    #[error("Malformed data set {path}: {reason}")]
    Malformed {
        /// Offending file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
