use axum::Router;
use axum::middleware::from_fn;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};

use super::handlers;
use super::middleware::{access_log, request_id};
use super::state::AppState;

/// Builds the service router.
///
/// Layers run outermost first: CORS, request id, access log.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/fill/{*rest}", get(handlers::fill))
        .route("/metrics", get(handlers::metrics))
        .route("/healthz", get(handlers::healthz))
        .layer(from_fn(access_log))
        .layer(from_fn(request_id))
        .layer(cors)
        .with_state(state)
}
