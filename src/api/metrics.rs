//! `GET /metrics` in the Prometheus text format

use axum::{Router, http::header, response::IntoResponse, routing::get};
use prometheus::{Encoder, TextEncoder};

use crate::error::AppError;
use crate::metrics::REGISTRY;

async fn render_metrics() -> Result<impl IntoResponse, AppError> {
    let encoder = TextEncoder::new();
    let body = encoder
        .encode_to_string(&REGISTRY.gather())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode metrics: {e}")))?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_owned())], body))
}

/// Router serving the flow, provider, session and error counters.
///
/// Independent of the application state so it can sit outside the
/// traced routes.
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(render_metrics))
}
