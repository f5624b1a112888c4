//! Request fingerprinting.

use sha2::{Digest, Sha256};

/// Opaque cache key derived from a resize request.
///
/// Equal `(width, height, url)` triples always produce equal keys. The key is
/// the hex encoding of the first 16 bytes of a SHA-256 digest, so distinct
/// triples collide only with negligible probability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a resize of `source_url` to `width`x`height`.
    ///
    /// The URL is expected to be normalized already (see
    /// [`ImageRequest`](super::ImageRequest)); the only adjustment made here
    /// is lower-casing the scheme.
    #[must_use]
    pub fn fingerprint(width: u32, height: u32, source_url: &str) -> Self {
        let url = lowercase_scheme(source_url);

        let mut hasher = Sha256::new();
        hasher.update(width.to_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(height.to_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..16]))
    }

    /// Returns the key as a hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first `len` hex characters of the key.
    #[must_use]
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn lowercase_scheme(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => format!("{}://{rest}", scheme.to_ascii_lowercase()),
        None => url.to_string(),
    }
}
