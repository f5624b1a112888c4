//! Failure taxonomy of the fetch-transform-store pipeline.

use thiserror::Error;

use super::InvalidRequest;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced by the image pipeline.
///
/// Cloneable so that one failed attempt can be handed to every caller
/// waiting on the same fingerprint.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] InvalidRequest),

    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable { message: String, timed_out: bool },

    #[error("upstream rejected the request with HTTP {status}")]
    UpstreamRejected { status: u16 },

    #[error("upstream body exceeds {limit} bytes")]
    SourceTooLarge { limit: u64 },

    #[error("source is not a decodable image: {message}")]
    DecodeFailed { message: String },

    #[error("failed to encode resized image: {message}")]
    EncodeFailed { message: String },

    #[error("failed to store resized image: {message}")]
    StorageFailed { message: String },

    #[error("internal invariant violated: {message}")]
    InternalInvariantViolation { message: String },
}

impl PipelineError {
    /// Creates an upstream transport error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Creates an upstream timeout error.
    #[must_use]
    pub fn timed_out(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    /// Creates an encode error.
    #[must_use]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::EncodeFailed {
            message: message.into(),
        }
    }

    /// Creates a storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageFailed {
            message: message.into(),
        }
    }

    /// Creates an invariant violation error.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InternalInvariantViolation {
            message: message.into(),
        }
    }

    /// Stable snake_case name used in error bodies and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamRejected { .. } => "upstream_rejected",
            Self::SourceTooLarge { .. } => "source_too_large",
            Self::DecodeFailed { .. } => "decode_failed",
            Self::EncodeFailed { .. } => "encode_failed",
            Self::StorageFailed { .. } => "storage_failed",
            Self::InternalInvariantViolation { .. } => "internal_invariant_violation",
        }
    }

    /// Returns whether the failure was caused by the client.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    /// Returns whether the failure originated upstream.
    #[must_use]
    pub const fn is_upstream_error(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. }
                | Self::UpstreamRejected { .. }
                | Self::SourceTooLarge { .. }
        )
    }
}
