//! Request parsing rejections.

use thiserror::Error;

/// Reasons a `/fill/...` path is rejected before any upstream work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum InvalidRequest {
    #[error("not enough path segments in {path}")]
    MissingSegments { path: String },

    #[error("width must be a positive integer, got {value:?}")]
    InvalidWidth { value: String },

    #[error("height must be a positive integer, got {value:?}")]
    InvalidHeight { value: String },

    #[error("requested size {width}x{height} exceeds the limit of {max}")]
    DimensionTooLarge { width: u32, height: u32, max: u32 },

    #[error("source url cannot be parsed: {url}")]
    InvalidUrl { url: String },

    #[error("source url has no file extension: {url}")]
    MissingExtension { url: String },
}

impl InvalidRequest {
    /// Stable snake_case name used in error bodies and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingSegments { .. } => "missing_segments",
            Self::InvalidWidth { .. } => "invalid_width",
            Self::InvalidHeight { .. } => "invalid_height",
            Self::DimensionTooLarge { .. } => "dimension_too_large",
            Self::InvalidUrl { .. } => "invalid_url",
            Self::MissingExtension { .. } => "missing_extension",
        }
    }
}
