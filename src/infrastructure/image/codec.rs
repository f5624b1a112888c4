//! `image`-crate implementation of the codec port.

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;

use crate::domain::entities::OutputFormat;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ports::ImageCodecPort;
use crate::infrastructure::config::ResizeFilter;

/// Default JPEG quality, matching the common encoder default.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Decodes PNG/JPEG/WebP sources and resamples with a configurable filter.
#[derive(Debug, Clone, Copy)]
pub struct ImageCrateCodec {
    filter: ResizeFilter,
    jpeg_quality: u8,
}

impl Default for ImageCrateCodec {
    fn default() -> Self {
        Self::new(ResizeFilter::default(), DEFAULT_JPEG_QUALITY)
    }
}

impl ImageCrateCodec {
    /// Creates a codec; `jpeg_quality` is clamped to `1..=100`.
    #[must_use]
    pub fn new(filter: ResizeFilter, jpeg_quality: u8) -> Self {
        Self {
            filter,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }
}

impl ImageCodecPort for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> PipelineResult<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| PipelineError::decode(format!("failed to decode image: {e}")))
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, self.filter.to_filter_type())
    }

    fn encode(&self, image: &DynamicImage, format: OutputFormat) -> PipelineResult<Vec<u8>> {
        let mut buf = Vec::new();
        let has_alpha = image.color().has_alpha();

        let result = match format {
            OutputFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality);
                image.to_rgb8().write_with_encoder(encoder)
            }
            OutputFormat::Png if has_alpha => {
                image.to_rgba8().write_with_encoder(PngEncoder::new(&mut buf))
            }
            OutputFormat::Png => image.to_rgb8().write_with_encoder(PngEncoder::new(&mut buf)),
            OutputFormat::WebP if has_alpha => {
                image.to_rgba8().write_with_encoder(WebPEncoder::new_lossless(&mut buf))
            }
            OutputFormat::WebP => {
                image.to_rgb8().write_with_encoder(WebPEncoder::new_lossless(&mut buf))
            }
        };

        result.map_err(|e| PipelineError::encode(format!("failed to encode {format}: {e}")))?;
        Ok(buf)
    }
}
