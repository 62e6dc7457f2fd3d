//! Error types for the workload data model.

use thiserror::Error;

/// Errors raised while validating workload declarations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// An `index.codec` value outside the supported allow-list.
    #[error(
        "Invalid index.codec value '{0}'. Choose from available codecs: \
         ['default', 'best_compression', 'zstd', 'zstd_no_dict', 'qat_deflate', 'qat_lz4']"
    )]
    InvalidCodec(String),
}
