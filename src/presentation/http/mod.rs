//! HTTP boundary: routing, middleware and the server loop.

mod error;
mod handlers;
mod middleware;
mod router;
mod server;
mod state;

pub use error::ApiError;
pub use middleware::{REQUEST_ID_HEADER, RequestId};
pub use router::build_router;
pub use server::{serve, shutdown_signal};
pub use state::AppState;
