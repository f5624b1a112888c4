use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::application::{ImageCache, ImagePipeline};
use crate::domain::errors::PipelineResult;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::image::{DiskImageStore, HttpImageFetcher, ImageCrateCodec};
use crate::infrastructure::metrics::ProxyMetrics;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) pipeline: ImagePipeline,
    pub(crate) max_dimension: u32,
    pub(crate) request_timeout: Duration,
}

impl AppState {
    /// Wraps an already built pipeline.
    #[must_use]
    pub const fn new(
        pipeline: ImagePipeline,
        max_dimension: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            max_dimension,
            request_timeout,
        }
    }

    /// Builds the cache, adapters and pipeline described by `config`.
    ///
    /// # Errors
    /// Returns an error if the image directory cannot be created or the
    /// HTTP client cannot be built.
    pub async fn build(config: &AppConfig) -> PipelineResult<Self> {
        let store = DiskImageStore::new(config.effective_image_dir()).await?;
        let fetcher = HttpImageFetcher::new(&config.fetch)?;
        let codec = ImageCrateCodec::new(config.resize.filter, config.resize.jpeg_quality);

        info!(
            image_dir = %store.root().display(),
            cache_size = config.cache_size,
            filter = ?config.resize.filter,
            "Image pipeline ready"
        );

        let pipeline = ImagePipeline::new(
            Arc::new(ImageCache::new(config.cache_size)),
            Arc::new(fetcher),
            Arc::new(codec),
            store,
            Arc::new(ProxyMetrics::new()),
        );

        Ok(Self::new(
            pipeline,
            config.resize.max_dimension,
            config.server.request_timeout(),
        ))
    }

    /// The image pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &ImagePipeline {
        &self.pipeline
    }
}
