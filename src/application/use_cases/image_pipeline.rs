//! Fetch, resize, store and serve use case.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{Instrument, debug, error, info, warn};

use crate::application::services::{Role, Singleflight};
use crate::domain::entities::{
    CacheKey, ImageOrigin, ImageRequest, OutputFormat, ServedImage, StoredImage,
};
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ports::{ImageCodecPort, ImageFetchPort};
use crate::infrastructure::cache::BoundedLruCache;
use crate::infrastructure::image::DiskImageStore;
use crate::infrastructure::metrics::ProxyMetrics;

/// Cache index from fingerprint to stored artifact.
pub type ImageCache = BoundedLruCache<CacheKey, StoredImage>;

#[derive(Clone)]
struct FillOutcome {
    stored: StoredImage,
    bytes: Bytes,
    origin: ImageOrigin,
}

struct Shared {
    cache: Arc<ImageCache>,
    flights: Singleflight<CacheKey, PipelineResult<FillOutcome>>,
    fetcher: Arc<dyn ImageFetchPort>,
    codec: Arc<dyn ImageCodecPort>,
    store: DiskImageStore,
    metrics: Arc<ProxyMetrics>,
}

/// Serves resized images, filling the cache on a miss.
///
/// One instance is shared by every request handler. Concurrent misses for the
/// same fingerprint run a single fill; the cache only ever learns about an
/// artifact after it is completely written to disk.
#[derive(Clone)]
pub struct ImagePipeline {
    shared: Arc<Shared>,
}

impl ImagePipeline {
    /// Creates a pipeline over the given cache, adapters and store.
    #[must_use]
    pub fn new(
        cache: Arc<ImageCache>,
        fetcher: Arc<dyn ImageFetchPort>,
        codec: Arc<dyn ImageCodecPort>,
        store: DiskImageStore,
        metrics: Arc<ProxyMetrics>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                cache,
                flights: Singleflight::new(),
                fetcher,
                codec,
                store,
                metrics,
            }),
        }
    }

    /// The cache index.
    #[must_use]
    pub fn cache(&self) -> &ImageCache {
        &self.shared.cache
    }

    /// The metrics collector.
    #[must_use]
    pub fn metrics(&self) -> &ProxyMetrics {
        &self.shared.metrics
    }

    /// Returns the resized image for `request`.
    ///
    /// # Errors
    /// Returns the first failure of the fetch, codec or store step. No cache
    /// entry is created on any failure.
    pub async fn process(&self, request: &ImageRequest) -> PipelineResult<ServedImage> {
        let key = request.cache_key();

        if let Some(stored) = self.shared.cache.get(&key) {
            match self.shared.store.read(&stored.path).await? {
                Some(bytes) => {
                    debug!(key = %key, "Serving cached image");
                    return Ok(ServedImage {
                        key,
                        bytes,
                        format: stored.format,
                        origin: ImageOrigin::Cache,
                    });
                }
                None => {
                    warn!(
                        key = %key,
                        path = %stored.path.display(),
                        "Cached artifact vanished, refilling"
                    );
                    self.shared.cache.remove(&key);
                }
            }
        }

        let shared = Arc::clone(&self.shared);
        let fill_request = request.clone();
        let fill_key = key.clone();
        // The fill runs on its own task and keeps the key in flight until it
        // finishes, even if every waiting client goes away.
        let (result, role) = self
            .shared
            .flights
            .run(key.clone(), || {
                async move { shared.fill(&fill_request, &fill_key).await }.in_current_span()
            })
            .await
            .map_err(|e| PipelineError::invariant(format!("fill task failed: {e}")))?;

        if role == Role::Follower {
            self.shared.metrics.record_coalesced();
            debug!(key = %key, "Joined in-flight fill");
        }

        let outcome = result?;
        Ok(ServedImage {
            key,
            bytes: outcome.bytes,
            format: outcome.stored.format,
            origin: outcome.origin,
        })
    }
}

impl Shared {
    async fn fill(&self, request: &ImageRequest, key: &CacheKey) -> PipelineResult<FillOutcome> {
        // An earlier fill may have finished between the lookup and this call.
        if let Some(stored) = self.cache.peek(key)
            && let Some(bytes) = self.store.read(&stored.path).await?
        {
            return Ok(FillOutcome {
                stored,
                bytes,
                origin: ImageOrigin::Cache,
            });
        }

        let format = OutputFormat::from_extension(request.extension());
        let path = self.store.artifact_path(request, key);

        if let Some(bytes) = self.store.read(&path).await? {
            let stored = StoredImage {
                path,
                format,
                size: bytes.len() as u64,
            };
            self.register(key, stored.clone())?;
            self.metrics.record_disk_recovery();
            info!(key = %key, path = %stored.path.display(), "Recovered artifact from disk");
            return Ok(FillOutcome {
                stored,
                bytes,
                origin: ImageOrigin::Disk,
            });
        }

        self.metrics.record_upstream_fetch();
        let source = self
            .fetcher
            .fetch(request.source_url())
            .await
            .inspect_err(|e| warn!(url = %request.source_url(), error = %e, "Fetch failed"))?;

        let codec = Arc::clone(&self.codec);
        let (width, height) = (request.width(), request.height());
        let encoded = tokio::task::spawn_blocking(move || {
            let decoded = codec.decode(&source.bytes)?;
            let resized = codec.resize(&decoded, width, height);
            codec.encode(&resized, format)
        })
        .await
        .map_err(|e| PipelineError::decode(format!("Decode task panicked: {e}")))??;

        let bytes = Bytes::from(encoded);
        let size = self.store.write(&path, bytes.clone()).await?;
        let stored = StoredImage { path, format, size };
        self.register(key, stored.clone())?;

        info!(
            key = %key,
            url = %request.source_url(),
            width,
            height,
            size,
            "Stored resized image"
        );
        Ok(FillOutcome {
            stored,
            bytes,
            origin: ImageOrigin::Network,
        })
    }

    fn register(&self, key: &CacheKey, stored: StoredImage) -> PipelineResult<()> {
        self.cache.set(key.clone(), stored);
        self.cache.check().map_err(|e| {
            error!(key = %key, error = %e, "Cache invariant violated");
            PipelineError::invariant(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    use image::{DynamicImage, ImageFormat, RgbImage};
    use tempfile::TempDir;

    use crate::domain::ports::mocks::MockFetchPort;
    use crate::infrastructure::image::ImageCrateCodec;

    fn source_png() -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 5) as u8, 90])
        }));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    async fn pipeline_with(
        fetcher: Arc<MockFetchPort>,
        capacity: usize,
        dir: &TempDir,
    ) -> ImagePipeline {
        let store = DiskImageStore::new(dir.path().join("images")).await.unwrap();
        ImagePipeline::new(
            Arc::new(ImageCache::new(capacity)),
            fetcher,
            Arc::new(ImageCrateCodec::default()),
            store,
            Arc::new(ProxyMetrics::new()),
        )
    }

    fn request(path: &str) -> ImageRequest {
        ImageRequest::parse(path, None, 8192).unwrap()
    }

    fn artifact_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("images")).unwrap().count()
    }

    #[tokio::test]
    async fn test_miss_then_hit_fetches_once() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetchPort::serving(source_png()));
        let pipeline = pipeline_with(Arc::clone(&fetcher), 10, &dir).await;
        let req = request("/fill/100/50/example.com/img/cat.jpg");

        let first = pipeline.process(&req).await.unwrap();
        let second = pipeline.process(&req).await.unwrap();

        assert_eq!(first.origin, ImageOrigin::Network);
        assert_eq!(second.origin, ImageOrigin::Cache);
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.content_type(), "image/jpeg");
        assert_eq!(fetcher.calls(), 1);

        let stored = pipeline.cache().peek(&req.cache_key()).unwrap();
        assert!(stored.path.is_file());
        assert_eq!(stored.size, first.bytes.len() as u64);
        assert_eq!(pipeline.cache().stats().insertions, 1);

        let decoded = image::load_from_memory(&first.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetchPort::failing(PipelineError::unavailable(
            "dns error",
        )));
        let pipeline = pipeline_with(Arc::clone(&fetcher), 10, &dir).await;
        let req = request("/fill/100/50/bad-host-that-does-not-resolve/cat.jpg");

        let result = pipeline.process(&req).await;

        assert!(matches!(
            result,
            Err(PipelineError::UpstreamUnavailable { .. })
        ));
        assert!(pipeline.cache().is_empty());
        assert_eq!(pipeline.cache().stats().insertions, 0);
        assert_eq!(artifact_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetchPort::failing(PipelineError::UpstreamRejected {
            status: 503,
        }));
        let pipeline = pipeline_with(Arc::clone(&fetcher), 10, &dir).await;
        let req = request("/fill/10/10/example.com/cat.png");

        assert!(pipeline.process(&req).await.is_err());
        fetcher.set_response(Ok(crate::domain::entities::FetchedImage {
            bytes: Bytes::from(source_png()),
            content_type: Some("image/png".to_string()),
        }));

        let served = pipeline.process(&req).await.unwrap();
        assert_eq!(served.origin, ImageOrigin::Network);
        assert_eq!(served.content_type(), "image/png");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_decode_failure_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetchPort::serving(&b"<html>not an image</html>"[..]));
        let pipeline = pipeline_with(fetcher, 10, &dir).await;

        let result = pipeline
            .process(&request("/fill/10/10/example.com/cat.jpg"))
            .await;

        assert!(matches!(result, Err(PipelineError::DecodeFailed { .. })));
        assert!(pipeline.cache().is_empty());
        assert_eq!(artifact_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetchPort::serving(source_png()));
        let pipeline = pipeline_with(fetcher, 10, &dir).await;
        std::fs::remove_dir_all(dir.path().join("images")).unwrap();

        let result = pipeline
            .process(&request("/fill/10/10/example.com/cat.jpg"))
            .await;

        assert!(matches!(result, Err(PipelineError::StorageFailed { .. })));
        assert!(pipeline.cache().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_fetch_once() {
        let dir = TempDir::new().unwrap();
        let fetcher =
            Arc::new(MockFetchPort::serving(source_png()).with_delay(Duration::from_millis(200)));
        let pipeline = pipeline_with(Arc::clone(&fetcher), 10, &dir).await;
        let req = request("/fill/32/32/example.com/img/cat.jpg");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pipeline = pipeline.clone();
            let req = req.clone();
            handles.push(tokio::spawn(async move { pipeline.process(&req).await }));
        }

        let mut bodies = Vec::new();
        for handle in handles {
            bodies.push(handle.await.unwrap().unwrap().bytes);
        }

        assert_eq!(fetcher.calls(), 1);
        assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(pipeline.cache().len(), 1);
        assert_eq!(pipeline.metrics().snapshot().upstream_fetches, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_request_does_not_refetch() {
        let dir = TempDir::new().unwrap();
        let fetcher =
            Arc::new(MockFetchPort::serving(source_png()).with_delay(Duration::from_millis(300)));
        let pipeline = pipeline_with(Arc::clone(&fetcher), 10, &dir).await;
        let req = request("/fill/40/30/example.com/img/cat.jpg");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), pipeline.process(&req)).await;
        assert!(abandoned.is_err());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let served = pipeline.process(&req).await.unwrap();

        assert_eq!(served.origin, ImageOrigin::Network);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(pipeline.metrics().snapshot().coalesced_requests, 1);
        assert_eq!(artifact_count(&dir), 1);
    }

    #[tokio::test]
    async fn test_artifact_on_disk_is_recovered_without_fetch() {
        let dir = TempDir::new().unwrap();
        let req = request("/fill/40/30/example.com/cat.webp");

        let warm = pipeline_with(Arc::new(MockFetchPort::serving(source_png())), 10, &dir).await;
        let original = warm.process(&req).await.unwrap();

        let fetcher = Arc::new(MockFetchPort::failing(PipelineError::unavailable("down")));
        let restarted = pipeline_with(Arc::clone(&fetcher), 10, &dir).await;
        let recovered = restarted.process(&req).await.unwrap();

        assert_eq!(recovered.origin, ImageOrigin::Disk);
        assert_eq!(recovered.bytes, original.bytes);
        assert_eq!(fetcher.calls(), 0);
        assert_eq!(restarted.cache().len(), 1);
        assert_eq!(restarted.metrics().snapshot().disk_recoveries, 1);
    }

    #[tokio::test]
    async fn test_vanished_artifact_is_refilled() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetchPort::serving(source_png()));
        let pipeline = pipeline_with(Arc::clone(&fetcher), 10, &dir).await;
        let req = request("/fill/20/20/example.com/cat.jpg");

        pipeline.process(&req).await.unwrap();
        let stored = pipeline.cache().peek(&req.cache_key()).unwrap();
        std::fs::remove_file(&stored.path).unwrap();

        let served = pipeline.process(&req).await.unwrap();

        assert_eq!(served.origin, ImageOrigin::Network);
        assert_eq!(fetcher.calls(), 2);
        assert!(stored.path.is_file());
    }

    #[tokio::test]
    async fn test_zero_capacity_still_serves() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetchPort::serving(source_png()));
        let pipeline = pipeline_with(Arc::clone(&fetcher), 0, &dir).await;
        let req = request("/fill/20/20/example.com/cat.png");

        let first = pipeline.process(&req).await.unwrap();
        let second = pipeline.process(&req).await.unwrap();

        assert_eq!(first.origin, ImageOrigin::Network);
        assert_eq!(second.origin, ImageOrigin::Disk);
        assert!(pipeline.cache().is_empty());
        assert_eq!(fetcher.calls(), 1);
    }
}
