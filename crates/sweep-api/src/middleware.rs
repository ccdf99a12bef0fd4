use std::{sync::Arc, time::Duration};

use axum::{
    Json,
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sweep_core::MetricsBackend;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Label used for requests that matched no route.
const UNMATCHED: &str = "unmatched";

/// Count and log every request.
pub(crate) async fn track(
    State(metrics): State<Arc<dyn MetricsBackend>>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = req.method().as_str().to_owned();
    let uri_path = req.uri().path().to_owned();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED.to_owned());

    let response = next.run(req).await;
    let status = response.status();
    let code = status.as_u16();

    metrics.http_request(&method, &route, code);
    if status == StatusCode::REQUEST_TIMEOUT {
        metrics.http_timeout(&method, &route);
    }
    if status.is_server_error() {
        metrics.http_error(&method, &route, code, error_type(status));
    }

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    debug!(%method, path = %uri_path, status = code, elapsed_ms, "request processed");
    if code >= 400 {
        warn!(%method, path = %uri_path, status = code, "http request failed");
    }
    response
}

/// Answer 408 when the inner handler does not finish within the limit.
pub(crate) async fn deadline(
    State(limit): State<Duration>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "status": 408, "message": "Request timeout", "path": path })),
        )
            .into_response(),
    }
}

pub(crate) fn error_type(status: StatusCode) -> &'static str {
    match status {
        StatusCode::INTERNAL_SERVER_ERROR => "internal_server_error",
        StatusCode::SERVICE_UNAVAILABLE => "service_unavailable",
        StatusCode::GATEWAY_TIMEOUT => "gateway_timeout",
        _ => "server_error",
    }
}
