//! `reqwest`-backed source image fetcher.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::Url;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::domain::entities::FetchedImage;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ports::ImageFetchPort;
use crate::infrastructure::config::FetchConfig;

/// Downloads source images over HTTP(S) with a bounded number of
/// concurrent requests and a body size cap.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    max_source_bytes: u64,
}

impl std::fmt::Debug for HttpImageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImageFetcher")
            .field("available_permits", &self.semaphore.available_permits())
            .field("max_source_bytes", &self.max_source_bytes)
            .finish_non_exhaustive()
    }
}

impl HttpImageFetcher {
    /// Builds the shared HTTP client.
    ///
    /// # Errors
    /// Returns `UpstreamUnavailable` if the client cannot be constructed.
    pub fn new(config: &FetchConfig) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(config.max_idle_per_host)
            .user_agent(format!("{}/{}", crate::NAME, crate::VERSION))
            .build()
            .map_err(|e| PipelineError::unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            max_source_bytes: config.max_source_bytes,
        })
    }

    fn too_large(&self) -> PipelineError {
        PipelineError::SourceTooLarge {
            limit: self.max_source_bytes,
        }
    }
}

#[async_trait]
impl ImageFetchPort for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> PipelineResult<FetchedImage> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| PipelineError::unavailable("fetch limiter closed"))?;

        debug!(url = %url, "Fetching source image");

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify("Request failed", &e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Upstream rejected request");
            return Err(PipelineError::UpstreamRejected {
                status: status.as_u16(),
            });
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_source_bytes)
        {
            return Err(self.too_large());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify("Failed to read body", &e))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_source_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, size = body.len(), "Fetched source image");
        Ok(FetchedImage {
            bytes: body.freeze(),
            content_type,
        })
    }
}

fn classify(context: &str, error: &reqwest::Error) -> PipelineError {
    if error.is_timeout() {
        PipelineError::timed_out(format!("{context}: {error}"))
    } else {
        PipelineError::unavailable(format!("{context}: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::Router;
    use axum::http::header;
    use axum::routing::get;

    async fn spawn_upstream() -> SocketAddr {
        let app = Router::new()
            .route(
                "/ok.png",
                get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![7u8; 64]) }),
            )
            .route("/big.png", get(|| async { vec![0u8; 4096] }))
            .route(
                "/slow.png",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .route(
                "/broken.png",
                get(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn fetcher(max_source_bytes: u64) -> HttpImageFetcher {
        let config = FetchConfig {
            timeout_secs: 1,
            max_source_bytes,
            ..FetchConfig::default()
        };
        HttpImageFetcher::new(&config).unwrap()
    }

    fn url(addr: SocketAddr, path: &str) -> Url {
        Url::parse(&format!("http://{addr}{path}")).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let addr = spawn_upstream().await;
        let image = fetcher(1024).fetch(&url(addr, "/ok.png")).await.unwrap();

        assert_eq!(image.bytes.len(), 64);
        assert_eq!(image.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_not_found_is_rejected() {
        let addr = spawn_upstream().await;
        let result = fetcher(1024).fetch(&url(addr, "/missing.png")).await;

        assert!(matches!(
            result,
            Err(PipelineError::UpstreamRejected { status: 404 })
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_rejected() {
        let addr = spawn_upstream().await;
        let result = fetcher(1024).fetch(&url(addr, "/broken.png")).await;

        assert!(matches!(
            result,
            Err(PipelineError::UpstreamRejected { status: 500 })
        ));
    }

    #[tokio::test]
    async fn test_oversized_body() {
        let addr = spawn_upstream().await;
        let result = fetcher(1024).fetch(&url(addr, "/big.png")).await;

        assert!(matches!(
            result,
            Err(PipelineError::SourceTooLarge { limit: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let addr = spawn_upstream().await;
        let result = fetcher(1024).fetch(&url(addr, "/slow.png")).await;

        assert!(matches!(
            result,
            Err(PipelineError::UpstreamUnavailable { timed_out: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_port_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = fetcher(1024).fetch(&url(addr, "/ok.png")).await;
        assert!(matches!(
            result,
            Err(PipelineError::UpstreamUnavailable { .. })
        ));
    }
}
