//! Image handling infrastructure.
//!
//! This module provides:
//! - Source downloads over HTTP
//! - Decoding, resizing and encoding
//! - Durable storage of resized artifacts

pub mod codec;
pub mod disk_store;
pub mod http_fetcher;

pub use codec::ImageCrateCodec;
pub use disk_store::DiskImageStore;
pub use http_fetcher::HttpImageFetcher;
