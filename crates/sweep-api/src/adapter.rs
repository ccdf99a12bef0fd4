use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use sweep_core::{ResultStore, RunLauncher, RunOrigin};
use sweep_model::{RunPage, RunQuery, RunRecord};
use tracing::info;

use crate::{
    error::ApiError,
    handler::{ApiHandler, CleanupStatus},
};

/// Bridges the HTTP surface to a [`RunLauncher`] and an optional [`ResultStore`].
pub struct EngineApiAdapter {
    launcher: RunLauncher,
    store: Option<Arc<dyn ResultStore>>,
    trigger_timeout: Duration,
}

impl EngineApiAdapter {
    pub fn new(launcher: RunLauncher, trigger_timeout: Duration) -> Self {
        Self {
            launcher,
            store: None,
            trigger_timeout,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn store(&self) -> Result<&Arc<dyn ResultStore>, ApiError> {
        self.store.as_ref().ok_or(ApiError::StoreDisabled)
    }
}

#[async_trait]
impl ApiHandler for EngineApiAdapter {
    async fn trigger_cleanup(&self) -> Result<(), ApiError> {
        info!(timeout_secs = self.trigger_timeout.as_secs(), "cleanup triggered over http");
        // Detached: the run outlives the request and keeps its own deadline.
        drop(self.launcher.launch(RunOrigin::Manual, self.trigger_timeout));
        Ok(())
    }

    async fn cleanup_status(&self) -> Result<Option<CleanupStatus>, ApiError> {
        let engine = self.launcher.engine();
        let running = engine.is_running();

        if let Some(outcome) = engine.last_outcome() {
            return Ok(Some(CleanupStatus {
                running,
                last_run: outcome.to_record(outcome.finished_at),
            }));
        }

        let latest = match &self.store {
            Some(store) => store.latest().await?,
            None => None,
        };
        Ok(latest.map(|last_run| CleanupStatus { running, last_run }))
    }

    async fn list_runs(&self, query: RunQuery) -> Result<RunPage<RunRecord>, ApiError> {
        Ok(self.store()?.list(query).await?)
    }

    async fn get_run(&self, id: &str) -> Result<Option<RunRecord>, ApiError> {
        Ok(self.store()?.get(id).await?)
    }
}
