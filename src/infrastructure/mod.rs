//! Infrastructure layer with external service adapters.

/// Bounded LRU cache index.
pub mod cache;
/// Application configuration.
pub mod config;
/// Image handling (fetching, codec, durable storage).
pub mod image;
/// Prometheus-style counters.
pub mod metrics;

pub use cache::{BoundedLruCache, CacheStats};
pub use config::{AppConfig, CliArgs, ConfigError, ConfigLoader, LogLevel};
pub use image::{DiskImageStore, HttpImageFetcher, ImageCrateCodec};
pub use metrics::ProxyMetrics;
