use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to create or register collector: {0}")]
    Prometheus(#[from] prometheus::Error),
}
