//! Fillproxy - an image-resizing reverse proxy.
//!
//! Requests of the form `/fill/{width}/{height}/{source-url}` fetch the
//! source image, resize it, persist the result and serve it. Repeated
//! requests are answered from a bounded LRU index over the stored artifacts,
//! and concurrent misses for the same image share a single fill.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the pipeline use case and coordination services.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;
/// Presentation layer exposing the service over HTTP.
pub mod presentation;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "fillproxy";
