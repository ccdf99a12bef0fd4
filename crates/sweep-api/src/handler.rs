use async_trait::async_trait;
use serde::Serialize;
use sweep_model::{RunPage, RunQuery, RunRecord};

use crate::error::ApiError;

/// Latest completed run plus whether another one is in progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStatus {
    pub running: bool,
    pub last_run: RunRecord,
}

/// Backend of the HTTP surface.
///
/// [`EngineApiAdapter`](crate::EngineApiAdapter) is the ready-made implementation.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Start a cleanup run in the background and return without waiting for it.
    async fn trigger_cleanup(&self) -> Result<(), ApiError>;

    /// `None` until a run has completed.
    async fn cleanup_status(&self) -> Result<Option<CleanupStatus>, ApiError>;

    async fn list_runs(&self, query: RunQuery) -> Result<RunPage<RunRecord>, ApiError>;

    async fn get_run(&self, id: &str) -> Result<Option<RunRecord>, ApiError>;
}
