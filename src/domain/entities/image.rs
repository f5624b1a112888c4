//! Domain types for source and resized images.

use std::path::PathBuf;

use bytes::Bytes;

use super::CacheKey;

/// Encoding used for a resized artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Baseline JPEG, alpha dropped.
    Jpeg,
    /// PNG.
    Png,
    /// Lossless WebP.
    WebP,
}

impl OutputFormat {
    /// Picks the output encoding for a source file extension.
    /// Unknown extensions fall back to JPEG.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "webp" => Self::WebP,
            _ => Self::Jpeg,
        }
    }

    /// MIME type served for this encoding.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
            Self::WebP => write!(f, "webp"),
        }
    }
}

/// Raw bytes downloaded from the source URL.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// Response body.
    pub bytes: Bytes,
    /// `Content-Type` reported by the upstream, if any.
    pub content_type: Option<String>,
}

/// Cache value: where a resized artifact lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Absolute path of the artifact.
    pub path: PathBuf,
    /// Encoding of the artifact.
    pub format: OutputFormat,
    /// Size of the artifact in bytes.
    pub size: u64,
}

/// Where a served image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    /// Cache index hit.
    Cache,
    /// Index miss, artifact already present on disk.
    Disk,
    /// Fetched, resized and stored by this pipeline run.
    Network,
}

impl ImageOrigin {
    /// Returns true unless the upstream was contacted.
    #[must_use]
    pub const fn is_hit(self) -> bool {
        !matches!(self, Self::Network)
    }
}

impl std::fmt::Display for ImageOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Disk => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A resized image ready to be written to the client.
#[derive(Debug, Clone)]
pub struct ServedImage {
    /// Fingerprint of the request.
    pub key: CacheKey,
    /// Encoded image bytes.
    pub bytes: Bytes,
    /// Encoding of `bytes`.
    pub format: OutputFormat,
    /// How the bytes were obtained.
    pub origin: ImageOrigin,
}

impl ServedImage {
    /// MIME type of the body.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}
