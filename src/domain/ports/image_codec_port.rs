//! Port definition for image decoding, resizing and encoding.

use crate::domain::entities::OutputFormat;
use crate::domain::errors::PipelineResult;

/// Port for the pixel-level work of the pipeline.
///
/// Calls are CPU-bound and synchronous; callers run them on the blocking pool.
/// Output must be deterministic for identical inputs.
pub trait ImageCodecPort: Send + Sync {
    /// Decodes encoded bytes into a pixel grid.
    ///
    /// # Errors
    /// Returns `DecodeFailed` if the bytes are not a supported image.
    fn decode(&self, bytes: &[u8]) -> PipelineResult<image::DynamicImage>;

    /// Resamples `image` to exactly `width`x`height`.
    fn resize(&self, image: &image::DynamicImage, width: u32, height: u32) -> image::DynamicImage;

    /// Encodes `image` in `format`.
    ///
    /// # Errors
    /// Returns `EncodeFailed` if the encoder rejects the image.
    fn encode(&self, image: &image::DynamicImage, format: OutputFormat) -> PipelineResult<Vec<u8>>;
}
