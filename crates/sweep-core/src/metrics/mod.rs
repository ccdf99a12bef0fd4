//! Metrics seam between the engine and a concrete backend.
//!
//! The engine only writes. Scraping goes through [`MetricsExport`], which a backend may
//! implement and which is handed explicitly to the HTTP layer.
use std::{error::Error, fmt, time::Duration};

use time::OffsetDateTime;

/// Where in a run a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStage {
    /// Listing images or containers.
    Inventory,
    /// Deleting a single image.
    Delete,
    /// Sending the run summary.
    Notify,
}

impl ErrorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStage::Inventory => "inventory",
            ErrorStage::Delete => "delete",
            ErrorStage::Notify => "notify",
        }
    }
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write-only metrics sink.
pub trait MetricsBackend: Send + Sync + 'static {
    fn images_removed(&self, count: usize);
    fn images_skipped(&self, count: usize);
    fn run_duration(&self, elapsed: Duration);
    fn last_run(&self, at: OffsetDateTime);
    fn error(&self, stage: ErrorStage);

    fn http_request(&self, _method: &str, _path: &str, _status: u16) {}
    fn http_timeout(&self, _method: &str, _path: &str) {}
    fn http_error(&self, _method: &str, _path: &str, _status: u16, _kind: &str) {}
}

/// Scrape capability of a metrics backend.
pub trait MetricsExport: Send + Sync + 'static {
    /// Value of the `Content-Type` header for [`MetricsExport::export`].
    fn content_type(&self) -> String;

    fn export(&self) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>>;
}

/// Backend that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    fn images_removed(&self, _count: usize) {}
    fn images_skipped(&self, _count: usize) {}
    fn run_duration(&self, _elapsed: Duration) {}
    fn last_run(&self, _at: OffsetDateTime) {}
    fn error(&self, _stage: ErrorStage) {}
}
