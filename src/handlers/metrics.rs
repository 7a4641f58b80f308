//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs one collection cycle against the Tdarr server and
//! returns the cycle snapshot followed by the exporter's own telemetry.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for the telemetry section.
const BUFFER_CAP: usize = 4 * 1024;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    let start = Instant::now();
    debug!("Processing metrics request");

    let snapshot = state.collector.collect().await;
    let mut body = match snapshot.encode() {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to encode Tdarr snapshot: {}", e);
            state.scrape_requests.with_label_values(&["500"]).inc();
            return Err(MetricsError::EncodingFailed);
        }
    };

    state.scrape_duration.set(start.elapsed().as_secs_f64());
    state.scrape_requests.with_label_values(&["200"]).inc();

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    if let Err(e) = TextEncoder::new().encode(&state.registry.gather(), &mut buffer) {
        error!("Failed to encode exporter telemetry: {}", e);
        return Err(MetricsError::EncodingFailed);
    }
    let telemetry = String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)?;
    body.push_str(&telemetry);

    debug!(
        aborted = snapshot.is_aborted(),
        bytes = body.len(),
        "Metrics request completed in {:.3}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body))
}
