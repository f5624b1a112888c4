//! Port definition for downloading source images.

use reqwest::Url;

use crate::domain::entities::FetchedImage;
use crate::domain::errors::PipelineResult;

/// Port for fetching source image bytes.
/// Implementations must be thread-safe and share connections across calls.
#[async_trait::async_trait]
pub trait ImageFetchPort: Send + Sync {
    /// Downloads the body at `url`.
    ///
    /// Transport failures map to `UpstreamUnavailable`, non-2xx statuses to
    /// `UpstreamRejected`. Retries, if any, happen inside the implementation.
    async fn fetch(&self, url: &Url) -> PipelineResult<FetchedImage>;
}
