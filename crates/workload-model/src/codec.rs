//! Allow-list validation for index compression codecs.

use crate::error::ModelError;

/// Compression codecs accepted in `index.codec` settings.
pub const INDEX_CODECS: [&str; 6] = [
    "default",
    "best_compression",
    "zstd",
    "zstd_no_dict",
    "qat_deflate",
    "qat_lz4",
];

/// Validate a requested `index.codec` value against the allow-list.
///
/// Returns [`ModelError::InvalidCodec`] naming the offending value and the
/// available codecs.
pub fn validate_index_codec(codec: &str) -> Result<(), ModelError> {
    if INDEX_CODECS.contains(&codec) {
        Ok(())
    } else {
        Err(ModelError::InvalidCodec(codec.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codecs_are_accepted() {
        for codec in INDEX_CODECS {
            assert!(validate_index_codec(codec).is_ok());
        }
    }

    #[test]
    fn test_invalid_codec_names_value_and_allow_list() {
        let err = validate_index_codec("invalid_codec").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'invalid_codec'"));
        assert!(message.contains("'best_compression'"));
        assert!(message.contains("'qat_lz4'"));
    }
}
