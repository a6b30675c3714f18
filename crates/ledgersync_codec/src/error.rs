//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while building queries or decoding documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a query document.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// The document could not be cleaned before parsing.
    #[error("sanitize failed at byte {offset}: {message}")]
    Sanitize {
        /// Byte offset of the offending input.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// The document is not well-formed.
    #[error("malformed document: {message}")]
    MalformedDocument {
        /// Description of the structural error.
        message: String,
    },

    /// A record element lacks a required identity field.
    #[error("<{element}> is missing required field {field}")]
    MissingField {
        /// Element name.
        element: String,
        /// Field (tag) name.
        field: String,
    },

    /// A field is present but cannot be interpreted.
    #[error("<{element}> has invalid {field}: {value:?}")]
    InvalidField {
        /// Element name.
        element: String,
        /// Field (tag) name.
        field: String,
        /// The raw value.
        value: String,
    },

    /// The source answered with an error envelope instead of data.
    #[error("source reported an error: {message}")]
    SourceError {
        /// Message reported by the source.
        message: String,
    },

    /// Unknown entity type name.
    #[error("unknown entity type: {name}")]
    UnknownEntity {
        /// Name that failed to parse.
        name: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a sanitize error.
    pub fn sanitize(offset: usize, message: impl Into<String>) -> Self {
        Self::Sanitize {
            offset,
            message: message.into(),
        }
    }

    /// Create a malformed document error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: message.into(),
        }
    }

    /// Create a missing field error.
    pub fn missing_field(element: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            element: element.into(),
            field: field.into(),
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(
        element: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            element: element.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns true if the error concerns a single record rather than the
    /// whole document.
    pub fn is_per_record(&self) -> bool {
        matches!(self, Self::MissingField { .. } | Self::InvalidField { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_record_classification() {
        assert!(CodecError::missing_field("LEDGER", "GUID").is_per_record());
        assert!(CodecError::invalid_field("LEDGER", "ALTERID", "x").is_per_record());
        assert!(!CodecError::malformed("unexpected eof").is_per_record());
        assert!(!CodecError::sanitize(3, "bad reference").is_per_record());
    }

    #[test]
    fn error_display() {
        let err = CodecError::missing_field("VOUCHER", "GUID");
        assert_eq!(err.to_string(), "<VOUCHER> is missing required field GUID");

        let err = CodecError::sanitize(12, "invalid character reference");
        assert!(err.to_string().contains("12"));
    }
}
