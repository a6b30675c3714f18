//! Error types for destination messages.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding destination messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The body could not be serialized.
    #[error("failed to encode {message_type}: {message}")]
    Encode {
        /// Message type being encoded.
        message_type: &'static str,
        /// Underlying error.
        message: String,
    },

    /// The body is not the expected shape.
    #[error("failed to decode {message_type}: {message}")]
    Decode {
        /// Message type being decoded.
        message_type: &'static str,
        /// Underlying error.
        message: String,
    },
}

impl ProtocolError {
    /// Create an encode error.
    pub fn encode(message_type: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Encode {
            message_type,
            message: err.to_string(),
        }
    }

    /// Create a decode error.
    pub fn decode(message_type: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            message_type,
            message: err.to_string(),
        }
    }
}
