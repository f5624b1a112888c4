use axum::extract::State;
use axum::http::{HeaderName, Uri, header};
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use super::state::AppState;
use crate::domain::entities::ImageRequest;
use crate::domain::errors::PipelineError;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// `GET /fill/{width}/{height}/{url}`
pub async fn fill(State(state): State<AppState>, uri: Uri) -> Result<Response, ApiError> {
    let metrics = state.pipeline.metrics();
    metrics.record_request();

    let result = serve_fill(&state, &uri).await;
    if result.is_err() {
        metrics.record_failure();
    }
    result
}

async fn serve_fill(state: &AppState, uri: &Uri) -> Result<Response, ApiError> {
    let request = ImageRequest::parse(uri.path(), uri.query(), state.max_dimension)
        .map_err(PipelineError::from)?;

    let served = tokio::time::timeout(state.request_timeout, state.pipeline.process(&request))
        .await
        .map_err(|_| ApiError::Timeout(state.request_timeout))??;

    let cache_status = if served.origin.is_hit() { "HIT" } else { "MISS" };
    Ok((
        [
            (header::CONTENT_TYPE, served.content_type()),
            (X_CACHE, cache_status),
        ],
        served.bytes,
    )
        .into_response())
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = state.pipeline();
    let body = pipeline
        .metrics()
        .export_prometheus(&pipeline.cache().stats());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}
