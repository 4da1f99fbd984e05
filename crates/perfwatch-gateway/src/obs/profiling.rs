//! Profiling middleware: wraps the application handler with the collector's
//! request/response hooks.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use perfwatch_core::MetricsCollector;

pub async fn profiling_middleware(
    State(collector): State<Arc<MetricsCollector>>,
    request: Request,
    next: Next,
) -> Response {
    // full path, query included
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let sample = collector.on_request();
    let response = next.run(request).await;

    if let Some(row) = collector.on_response(&path, sample) {
        tracing::trace!(
            path = %row.path,
            duration_secs = row.duration_secs,
            slowest = row.is_slowest_so_far,
            "request profiled"
        );
    }
    response
}
