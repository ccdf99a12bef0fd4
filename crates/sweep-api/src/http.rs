use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{StatusCode, Uri, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sweep_core::{MetricsBackend, MetricsExport, NoOpMetrics};
use sweep_model::{RunQuery, RunRecord};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::debug;

use crate::{
    error::ApiError,
    handler::{ApiHandler, CleanupStatus},
    middleware,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build metadata served on `/version`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    pub build_time: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: "unknown".to_string(),
        }
    }
}

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    exporter: Option<Arc<dyn MetricsExport>>,
    metrics: Arc<dyn MetricsBackend>,
    version: VersionInfo,
    request_timeout: Duration,
}

struct AppState<H> {
    handler: Arc<H>,
    exporter: Option<Arc<dyn MetricsExport>>,
    version: Arc<VersionInfo>,
}

impl<H> Clone for AppState<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            exporter: self.exporter.clone(),
            version: Arc::clone(&self.version),
        }
    }
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            exporter: None,
            metrics: Arc::new(NoOpMetrics),
            version: VersionInfo::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Source of the `/metrics` body; without one the endpoint answers 503.
    pub fn with_exporter(mut self, exporter: Option<Arc<dyn MetricsExport>>) -> Self {
        self.exporter = exporter;
        self
    }

    /// Sink for request counters.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsBackend>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_version(mut self, version: VersionInfo) -> Self {
        self.version = version;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET /health - Liveness
    /// - GET /metrics - Prometheus exposition
    /// - GET /version - Build metadata
    /// - POST /api/v1/cleanup - Trigger a run, answers 202 immediately
    /// - GET /api/v1/cleanup/status - Last completed run
    /// - GET /api/v1/runs - Persisted runs, newest first
    /// - GET /api/v1/runs/{id} - One persisted run
    pub fn router(self) -> Router {
        let state = AppState {
            handler: self.handler,
            exporter: self.exporter,
            version: Arc::new(self.version),
        };

        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics::<H>))
            .route("/version", get(version::<H>))
            .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
            .route("/api/v1/cleanup", post(trigger_cleanup::<H>))
            .route("/api/v1/cleanup/status", get(cleanup_status::<H>))
            .route("/api/v1/runs", get(list_runs::<H>))
            .route("/api/v1/runs/{id}", get(get_run::<H>))
            .fallback(not_found)
            .with_state(state)
            .layer(from_fn_with_state(self.request_timeout, middleware::deadline))
            .layer(from_fn_with_state(self.metrics, middleware::track))
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct TriggerResponse {
    status: &'static str,
    message: &'static str,
    time: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(flatten)]
    inner: CleanupStatus,
}

#[derive(Debug, Deserialize)]
struct ListRunsParams {
    /// Max items per page (default 20, max 100)
    limit: Option<usize>,
    /// Offset for pagination (default 0)
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ListRunsResponse {
    runs: Vec<RunRecord>,
    total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /metrics
async fn metrics<H>(State(state): State<AppState<H>>) -> Result<Response, ApiError>
where
    H: ApiHandler,
{
    let Some(exporter) = &state.exporter else {
        return Err(ApiError::Unavailable("metrics exporter not configured".into()));
    };
    let body = exporter
        .export()
        .map_err(|e| ApiError::Internal(format!("encode metrics: {e}")))?;

    Ok(([(header::CONTENT_TYPE, exporter.content_type())], body).into_response())
}

/// GET /version
async fn version<H>(State(state): State<AppState<H>>) -> impl IntoResponse
where
    H: ApiHandler,
{
    Json(json!({
        "version": state.version.version,
        "buildTime": state.version.build_time,
        "status": "ok",
    }))
}

/// POST /api/v1/cleanup
async fn trigger_cleanup<H>(State(state): State<AppState<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    state.handler.trigger_cleanup().await?;

    let response = TriggerResponse {
        status: "accepted",
        message: "Cleanup job has been triggered",
        time: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/v1/cleanup/status
async fn cleanup_status<H>(State(state): State<AppState<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let inner = state
        .handler
        .cleanup_status()
        .await?
        .ok_or_else(|| ApiError::NotFound("no cleanup run has completed yet".into()))?;

    Ok(Json(StatusResponse {
        status: "success",
        inner,
    }))
}

/// GET /api/v1/runs
///
/// Query params (all optional):
/// - ?limit=20 - max items per page (default 20, max 100)
/// - ?offset=0 - pagination offset (default 0)
async fn list_runs<H>(
    State(state): State<AppState<H>>,
    params: Result<Query<ListRunsParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let Query(params) = params.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let mut query = RunQuery::new();
    if let Some(limit) = params.limit {
        query = query.with_limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.with_offset(offset);
    }

    let page = state.handler.list_runs(query).await?;
    debug!(count = page.items.len(), total = page.total, "runs listed");

    Ok(Json(ListRunsResponse {
        runs: page.items,
        total: page.total,
    }))
}

/// GET /api/v1/runs/{id}
async fn get_run<H>(
    State(state): State<AppState<H>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    if id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("run id cannot be empty".into()));
    }

    let run = state
        .handler
        .get_run(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("run {id} not found")))?;
    Ok(Json(run))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": 404,
            "message": "Route not found",
            "path": uri.path(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::error::Error;
    use sweep_core::ErrorStage;
    use sweep_model::RunPage;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubHandler {
        triggered: Mutex<usize>,
        runs: Vec<RunRecord>,
        slow_trigger: bool,
    }

    fn record(id: &str) -> RunRecord {
        RunRecord {
            id: id.to_string(),
            host_info: "Unknown host".into(),
            started_at: OffsetDateTime::UNIX_EPOCH,
            finished_at: OffsetDateTime::UNIX_EPOCH + Duration::from_secs(5),
            duration: Duration::from_secs(5),
            total: 3,
            removed: 2,
            skipped: 1,
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::from_secs(6),
        }
    }

    #[async_trait]
    impl ApiHandler for StubHandler {
        async fn trigger_cleanup(&self) -> Result<(), ApiError> {
            if self.slow_trigger {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            *self.triggered.lock() += 1;
            Ok(())
        }

        async fn cleanup_status(&self) -> Result<Option<CleanupStatus>, ApiError> {
            Ok(self.runs.first().cloned().map(|last_run| CleanupStatus {
                running: false,
                last_run,
            }))
        }

        async fn list_runs(&self, query: RunQuery) -> Result<RunPage<RunRecord>, ApiError> {
            let items = self
                .runs
                .iter()
                .skip(query.offset)
                .take(query.limit)
                .cloned()
                .collect();
            Ok(RunPage {
                items,
                total: self.runs.len(),
            })
        }

        async fn get_run(&self, id: &str) -> Result<Option<RunRecord>, ApiError> {
            Ok(self.runs.iter().find(|r| r.id == id).cloned())
        }
    }

    #[derive(Default)]
    struct RecordingMetrics {
        requests: Mutex<Vec<(String, String, u16)>>,
        timeouts: Mutex<usize>,
        errors: Mutex<Vec<(u16, String)>>,
    }

    impl MetricsBackend for RecordingMetrics {
        fn images_removed(&self, _count: usize) {}
        fn images_skipped(&self, _count: usize) {}
        fn run_duration(&self, _elapsed: Duration) {}
        fn last_run(&self, _at: OffsetDateTime) {}
        fn error(&self, _stage: ErrorStage) {}

        fn http_request(&self, method: &str, path: &str, status: u16) {
            self.requests
                .lock()
                .push((method.to_string(), path.to_string(), status));
        }
        fn http_timeout(&self, _method: &str, _path: &str) {
            *self.timeouts.lock() += 1;
        }
        fn http_error(&self, _method: &str, _path: &str, status: u16, kind: &str) {
            self.errors.lock().push((status, kind.to_string()));
        }
    }

    struct FixedExporter;

    impl MetricsExport for FixedExporter {
        fn content_type(&self) -> String {
            "text/plain; version=0.0.4".into()
        }
        fn export(&self) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
            Ok(b"image_cleanup_removed_total 1\n".to_vec())
        }
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json_body(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn health_and_version() {
        let app = HttpApi::new(Arc::new(StubHandler::default()))
            .with_version(VersionInfo {
                version: "1.2.3".into(),
                build_time: "2024-03-01T00:00:00Z".into(),
            })
            .router();

        let (status, body) = call(app.clone(), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({"status": "ok"}));

        let (status, body) = call(app, "GET", "/version").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json_body(&body),
            json!({"version": "1.2.3", "buildTime": "2024-03-01T00:00:00Z", "status": "ok"})
        );
    }

    #[tokio::test]
    async fn trigger_is_accepted() {
        let handler = Arc::new(StubHandler::default());
        let app = HttpApi::new(handler.clone()).router();

        let (status, body) = call(app, "POST", "/api/v1/cleanup").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let body = json_body(&body);
        assert_eq!(body["status"], "accepted");
        assert!(body["time"].as_str().is_some_and(|t| !t.is_empty()));
        assert_eq!(*handler.triggered.lock(), 1);
    }

    #[tokio::test]
    async fn status_is_404_before_first_run() {
        let app = HttpApi::new(Arc::new(StubHandler::default())).router();
        let (status, body) = call(app, "GET", "/api/v1/cleanup/status").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(&body)["status"], 404);
    }

    #[tokio::test]
    async fn status_reports_last_run() {
        let handler = StubHandler {
            runs: vec![record("r1")],
            ..Default::default()
        };
        let app = HttpApi::new(Arc::new(handler)).router();

        let (status, body) = call(app, "GET", "/api/v1/cleanup/status").await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        assert_eq!(body["status"], "success");
        assert_eq!(body["running"], false);
        assert_eq!(body["lastRun"]["id"], "r1");
        assert_eq!(body["lastRun"]["durationMs"], 5000);
    }

    #[tokio::test]
    async fn runs_listing_and_lookup() {
        let handler = StubHandler {
            runs: vec![record("r3"), record("r2"), record("r1")],
            ..Default::default()
        };
        let app = HttpApi::new(Arc::new(handler)).router();

        let (status, body) = call(app.clone(), "GET", "/api/v1/runs?limit=2&offset=1").await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        assert_eq!(body["total"], 3);
        let ids: Vec<_> = body["runs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["r2", "r1"]);

        let (status, body) = call(app.clone(), "GET", "/api/v1/runs/r2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["removed"], 2);

        let (status, _) = call(app, "GET", "/api/v1/runs/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_pagination_is_json_400() {
        let app = HttpApi::new(Arc::new(StubHandler::default())).router();

        let (status, body) = call(app, "GET", "/api/v1/runs?limit=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = json_body(&body);
        assert_eq!(body["status"], 400);
        assert!(body["message"].as_str().is_some_and(|m| m.starts_with("invalid request")));
    }

    #[tokio::test]
    async fn metrics_endpoint() {
        let app = HttpApi::new(Arc::new(StubHandler::default())).router();
        let (status, body) = call(app, "GET", "/metrics").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(&body)["status"], 503);

        let app = HttpApi::new(Arc::new(StubHandler::default()))
            .with_exporter(Some(Arc::new(FixedExporter)))
            .router();
        let (status, body) = call(app, "GET", "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"image_cleanup_removed_total 1\n");
    }

    #[tokio::test]
    async fn unknown_route_and_favicon() {
        let app = HttpApi::new(Arc::new(StubHandler::default())).router();

        let (status, body) = call(app.clone(), "GET", "/does/not/exist").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(&body),
            json!({"status": 404, "message": "Route not found", "path": "/does/not/exist"})
        );

        let (status, body) = call(app, "GET", "/favicon.ico").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn requests_are_counted_by_route() {
        let metrics = Arc::new(RecordingMetrics::default());
        let app = HttpApi::new(Arc::new(StubHandler::default()))
            .with_metrics(metrics.clone())
            .router();

        call(app.clone(), "GET", "/health").await;
        call(app.clone(), "GET", "/api/v1/runs/abc").await;
        call(app.clone(), "GET", "/nowhere").await;
        call(app, "GET", "/metrics").await;

        let requests = metrics.requests.lock().clone();
        assert_eq!(
            requests,
            [
                ("GET".to_string(), "/health".to_string(), 200),
                ("GET".to_string(), "/api/v1/runs/{id}".to_string(), 404),
                ("GET".to_string(), "unmatched".to_string(), 404),
                ("GET".to_string(), "/metrics".to_string(), 503),
            ]
        );
        assert_eq!(
            metrics.errors.lock().clone(),
            [(503, "service_unavailable".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_request_times_out() {
        let metrics = Arc::new(RecordingMetrics::default());
        let handler = Arc::new(StubHandler {
            slow_trigger: true,
            ..Default::default()
        });
        let app = HttpApi::new(handler.clone())
            .with_metrics(metrics.clone())
            .with_request_timeout(Duration::from_secs(1))
            .router();

        let (status, body) = call(app, "POST", "/api/v1/cleanup").await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(json_body(&body)["message"], "Request timeout");
        assert_eq!(*metrics.timeouts.lock(), 1);
        assert_eq!(*handler.triggered.lock(), 0);
    }
}
