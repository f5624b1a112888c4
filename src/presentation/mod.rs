//! Presentation layer exposing the pipeline over HTTP.

/// HTTP server, routes and middleware.
pub mod http;

pub use http::{AppState, build_router, serve, shutdown_signal};
