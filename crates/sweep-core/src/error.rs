use sweep_model::{AbortCause, ImageId};
use thiserror::Error;

/// Reasons a cleanup run returns without an outcome.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("a cleanup run is already in progress")]
    AlreadyRunning,
    #[error("failed to get images: {0}")]
    ListImages(#[source] InventoryError),
    #[error("failed to get used images: {0}")]
    ListInUse(#[source] InventoryError),
    #[error("run aborted while reading inventory: {0}")]
    Aborted(AbortCause),
}

/// Failures reported by an [`ImageRepository`](crate::ImageRepository).
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("runtime command failed: {0}")]
    Command(String),
    #[error("failed to decode runtime output: {0}")]
    Decode(String),
    #[error("image {0} not found")]
    NotFound(ImageId),
    #[error("image {0} is in use")]
    InUse(ImageId),
}

/// Failures reported by a [`Notifier`](crate::Notifier).
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("channel returned status {0}")]
    Status(u16),
    #[error("channel rejected message: {0}")]
    Rejected(String),
}

/// Failures reported by a [`ResultStore`](crate::ResultStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored record is malformed: {0}")]
    Decode(String),
}

/// Invalid schedule expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("empty schedule expression")]
    Empty,
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),
    #[error("invalid {field} field: '{value}'")]
    InvalidField { field: &'static str, value: String },
    #[error("unknown descriptor: '{0}'")]
    UnknownDescriptor(String),
    #[error("invalid interval: '{0}' (expected e.g. 90s, 15m, 1h30m; at least 1s)")]
    InvalidInterval(String),
}
