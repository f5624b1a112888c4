//! Application layer with use cases and services.

/// Coordination services.
pub mod services;
/// Use case implementations.
pub mod use_cases;

pub use services::{Abandoned, Role, Singleflight};
pub use use_cases::{ImageCache, ImagePipeline};
