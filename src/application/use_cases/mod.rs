//! Use case implementations.

mod image_pipeline;

pub use image_pipeline::{ImageCache, ImagePipeline};
