//! Error types for the sync engine.

use crate::http::HttpFailure;
use ledgersync_codec::CodecError;
use ledgersync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The source or destination could not be reached.
    #[error("{target} unreachable: {message}")]
    Connectivity {
        /// Which side failed (`source` or `destination`).
        target: &'static str,
        /// Error message.
        message: String,
    },

    /// A request exceeded its timeout.
    #[error("{target} request timed out")]
    Timeout {
        /// Which side failed.
        target: &'static str,
    },

    /// A response could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The source document could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A request body could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The destination refused a request.
    #[error("destination rejected request with status {status}: {body}")]
    DestinationRejected {
        /// HTTP status.
        status: u16,
        /// Response body or message.
        body: String,
    },

    /// The source does not have the expected tenant open.
    #[error("tenant '{expected}' is not active in the source (active: {active:?})")]
    TenantMismatch {
        /// Tenant the run was configured for.
        expected: String,
        /// Tenants the source reported.
        active: Vec<String>,
    },

    /// The tenant check could not run and the policy forbids proceeding.
    #[error("tenant check unavailable: {0}")]
    TenantCheckUnavailable(String),

    /// The source returned nothing while the destination holds records.
    #[error("source returned no records while destination holds {destination_count}")]
    EmptySource {
        /// Records held by the destination.
        destination_count: usize,
    },

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Maps a transport failure on `target`.
    pub fn from_failure(target: &'static str, failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Timeout => Self::Timeout { target },
            HttpFailure::Connect(message) => Self::Connectivity { target, message },
        }
    }

    /// Wraps a response that arrived but could not be decoded.
    pub fn malformed(err: impl std::fmt::Display) -> Self {
        Self::MalformedResponse(err.to_string())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Connectivity { .. }
                | SyncError::Timeout { .. }
                | SyncError::DestinationRejected { .. }
                | SyncError::TenantCheckUnavailable(_)
                | SyncError::EmptySource { .. }
        )
    }

    /// Returns true if the whole multi-entity run must stop.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            SyncError::TenantMismatch { .. }
                | SyncError::TenantCheckUnavailable(_)
                | SyncError::Cancelled
        )
    }
}
