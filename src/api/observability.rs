use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use super::AppState;

/// GET /metrics
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.prometheus_handle.as_ref() {
        Some(handle) => handle.render(),
        None => "Metrics are disabled".to_string(),
    }
}

/// Wraps each request in a span carrying a fresh request id. The span's
/// `user_id` field starts empty; the auth middleware fills it in once
/// the session is resolved, so log lines from course and promo handlers
/// can be tied back to an account.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let request_id = Uuid::new_v4();

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    // Metric series are keyed by the route template so that
    // /api/courses/42 and /api/courses/43 share one series.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
        user_id = tracing::field::Empty,
    );

    async move {
        let response = next.run(req).await;

        let status = response.status().as_u16();
        let elapsed = started.elapsed();

        let labels = [
            ("method", method.to_string()),
            ("path", route.unwrap_or(path)),
            ("status", status.to_string()),
        ];
        metrics::counter!("http_requests_total", &labels).increment(1);
        metrics::histogram!("http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());

        info!(
            status = status,
            elapsed_ms = %elapsed.as_millis(),
            "request completed"
        );

        response
    }
    .instrument(span)
    .await
}

pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}
