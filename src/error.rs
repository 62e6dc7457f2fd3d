//! Error types for parameter generation.

use thiserror::Error;

/// Errors raised while configuring or running a parameter source.
#[derive(Debug, Error)]
pub enum ParamsError {
    /// The workload or the operation parameters are misconfigured.
    #[error("{0}")]
    InvalidSyntax(String),

    /// An internal consistency check failed while streaming data.
    #[error("{0}")]
    Assertion(String),

    #[error(transparent)]
    DataSet(#[from] vector_dataset::DataSetError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ParamsError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ParamsError::InvalidSyntax(message.into())
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        ParamsError::Assertion(message.into())
    }
}
