use std::{error::Error, time::Duration};

use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use sweep_core::{ErrorStage, MetricsBackend, MetricsExport, hostname_or_unknown};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::MetricsError;

const NAMESPACE: &str = "image_cleanup";

/// Prometheus-backed metrics with a private registry.
///
/// Cheap to clone; clones share the same collectors.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    hostname: String,
    removed: IntCounterVec,
    skipped: IntCounterVec,
    duration: HistogramVec,
    last_run: GaugeVec,
    errors: IntCounterVec,
    http_requests: IntCounterVec,
    http_timeouts: IntCounterVec,
    http_errors: IntCounterVec,
}

impl PrometheusMetrics {
    /// Collectors labelled with this machine's hostname.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_hostname(hostname_or_unknown())
    }

    pub fn with_hostname(hostname: impl Into<String>) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let removed = counter(&registry, "removed_total", "The total number of images removed", &["hostname"])?;
        let skipped = counter(&registry, "skipped_total", "The total number of images skipped", &["hostname"])?;
        let errors = counter(&registry, "errors_total", "The total number of cleanup errors", &["hostname", "stage"])?;
        let http_requests = counter(
            &registry,
            "http_requests_total",
            "Total number of HTTP requests",
            &["hostname", "code", "method", "path"],
        )?;
        let http_timeouts = counter(
            &registry,
            "http_request_timeouts_total",
            "Total number of HTTP request timeouts",
            &["hostname", "method", "path"],
        )?;
        let http_errors = counter(
            &registry,
            "http_request_errors_total",
            "Total number of HTTP request errors",
            &["hostname", "method", "path", "status", "error_type"],
        )?;

        let duration = HistogramVec::new(
            HistogramOpts::new("duration_seconds", "Time spent running image cleanup")
                .namespace(NAMESPACE),
            &["hostname"],
        )?;
        registry.register(Box::new(duration.clone()))?;

        let last_run = GaugeVec::new(
            Opts::new("last_run_timestamp", "Timestamp of the last cleanup run").namespace(NAMESPACE),
            &["hostname"],
        )?;
        registry.register(Box::new(last_run.clone()))?;

        let hostname = hostname.into();
        info!(%hostname, "prometheus metrics initialized");

        Ok(Self {
            registry,
            hostname,
            removed,
            skipped,
            duration,
            last_run,
            errors,
            http_requests,
            http_timeouts,
            http_errors,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

fn counter(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec, MetricsError> {
    let c = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl MetricsBackend for PrometheusMetrics {
    fn images_removed(&self, count: usize) {
        self.removed
            .with_label_values(&[self.hostname.as_str()])
            .inc_by(count as u64);
    }

    fn images_skipped(&self, count: usize) {
        self.skipped
            .with_label_values(&[self.hostname.as_str()])
            .inc_by(count as u64);
    }

    fn run_duration(&self, elapsed: Duration) {
        self.duration
            .with_label_values(&[self.hostname.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    fn last_run(&self, at: OffsetDateTime) {
        self.last_run
            .with_label_values(&[self.hostname.as_str()])
            .set(at.unix_timestamp() as f64);
    }

    fn error(&self, stage: ErrorStage) {
        self.errors
            .with_label_values(&[self.hostname.as_str(), stage.as_str()])
            .inc();
    }

    fn http_request(&self, method: &str, path: &str, status: u16) {
        let code = status.to_string();
        self.http_requests
            .with_label_values(&[self.hostname.as_str(), code.as_str(), method, path])
            .inc();
        debug!(metric = "image_cleanup_http_requests_total", %code, method, path, "http request counted");
    }

    fn http_timeout(&self, method: &str, path: &str) {
        self.http_timeouts
            .with_label_values(&[self.hostname.as_str(), method, path])
            .inc();
    }

    fn http_error(&self, method: &str, path: &str, status: u16, kind: &str) {
        let status = status.to_string();
        self.http_errors
            .with_label_values(&[self.hostname.as_str(), method, path, status.as_str(), kind])
            .inc();
    }
}

impl MetricsExport for PrometheusMetrics {
    fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    fn export(&self) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exported(m: &PrometheusMetrics) -> String {
        String::from_utf8(m.export().unwrap()).unwrap()
    }

    #[test]
    fn run_series_are_labelled_by_host() {
        let m = PrometheusMetrics::with_hostname("node-1").unwrap();
        m.images_removed(2);
        m.images_removed(1);
        m.images_skipped(4);
        m.run_duration(Duration::from_millis(1_500));
        m.last_run(OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap());
        m.error(ErrorStage::Delete);
        m.error(ErrorStage::Delete);
        m.error(ErrorStage::Notify);

        let text = exported(&m);
        assert!(text.contains(r#"image_cleanup_removed_total{hostname="node-1"} 3"#));
        assert!(text.contains(r#"image_cleanup_skipped_total{hostname="node-1"} 4"#));
        assert!(text.contains(r#"image_cleanup_duration_seconds_count{hostname="node-1"} 1"#));
        assert!(text.contains(r#"image_cleanup_last_run_timestamp{hostname="node-1"} 17"#));
        assert!(text.contains(r#"image_cleanup_errors_total{hostname="node-1",stage="delete"} 2"#));
        assert!(text.contains(r#"image_cleanup_errors_total{hostname="node-1",stage="notify"} 1"#));
    }

    #[test]
    fn http_series() {
        let m = PrometheusMetrics::with_hostname("h").unwrap();
        m.http_request("GET", "/health", 200);
        m.http_timeout("POST", "/api/v1/cleanup");
        m.http_error("GET", "/metrics", 503, "service_unavailable");

        let text = exported(&m);
        assert!(text.contains(
            r#"image_cleanup_http_requests_total{code="200",hostname="h",method="GET",path="/health"} 1"#
        ));
        assert!(text.contains(
            r#"image_cleanup_http_request_timeouts_total{hostname="h",method="POST",path="/api/v1/cleanup"} 1"#
        ));
        assert!(text.contains(r#"error_type="service_unavailable""#));
    }

    #[test]
    fn separate_instances_do_not_share_registry() {
        let a = PrometheusMetrics::with_hostname("a").unwrap();
        let b = PrometheusMetrics::with_hostname("b").unwrap();
        a.images_removed(1);
        assert!(!exported(&b).contains(r#"hostname="a""#));
        assert!(a.content_type().starts_with("text/plain"));
    }
}
