//! Prometheus metrics backend for image cleanup runs.
//!
//! [`PrometheusMetrics`] implements [`sweep_core::MetricsBackend`] for the engine and the HTTP
//! middleware, and [`sweep_core::MetricsExport`] for the `/metrics` endpoint.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use sweep_core::{MetricsBackend, MetricsExport};
//! use sweep_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let metrics = Arc::new(PrometheusMetrics::with_hostname("node-1")?);
//! metrics.images_removed(3);
//!
//! let body = String::from_utf8(metrics.export()?)?;
//! assert!(body.contains("image_cleanup_removed_total{hostname=\"node-1\"} 3"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! Every series carries a `hostname` label.
//! - `image_cleanup_removed_total` - Counter
//! - `image_cleanup_skipped_total` - Counter
//! - `image_cleanup_duration_seconds` - Histogram
//! - `image_cleanup_last_run_timestamp` - Gauge, unix seconds
//! - `image_cleanup_errors_total{stage}` - Counter
//! - `image_cleanup_http_requests_total{code, method, path}` - Counter
//! - `image_cleanup_http_request_timeouts_total{method, path}` - Counter
//! - `image_cleanup_http_request_errors_total{method, path, status, error_type}` - Counter

mod error;
pub use error::MetricsError;

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
