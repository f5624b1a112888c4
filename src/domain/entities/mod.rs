//! Domain entity definitions.

mod cache_key;
mod image;
mod image_request;

pub use cache_key::CacheKey;
pub use image::{FetchedImage, ImageOrigin, OutputFormat, ServedImage, StoredImage};
pub use image_request::ImageRequest;
