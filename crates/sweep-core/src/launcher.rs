use std::{fmt, sync::Arc, time::Duration};

use sweep_model::RunOutcome;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{context::RunContext, engine::CleanupEngine, error::CleanupError};

/// Who asked for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOrigin {
    Scheduled,
    Manual,
}

impl RunOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOrigin::Scheduled => "scheduled",
            RunOrigin::Manual => "manual",
        }
    }
}

impl fmt::Display for RunOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spawns detached cleanup runs bound to the process shutdown token.
#[derive(Debug, Clone)]
pub struct RunLauncher {
    engine: Arc<CleanupEngine>,
    shutdown: CancellationToken,
}

impl RunLauncher {
    pub fn new(engine: Arc<CleanupEngine>, shutdown: CancellationToken) -> Self {
        Self { engine, shutdown }
    }

    pub fn engine(&self) -> &Arc<CleanupEngine> {
        &self.engine
    }

    /// Start a run in the background and return immediately.
    ///
    /// The run gets its own deadline of `timeout` and ends early on shutdown.
    pub fn launch(
        &self,
        origin: RunOrigin,
        timeout: Duration,
    ) -> JoinHandle<Result<RunOutcome, CleanupError>> {
        let engine = Arc::clone(&self.engine);
        let ctx = RunContext::new(&self.shutdown, timeout);

        tokio::spawn(async move {
            let res = engine.cleanup(&ctx).await;
            match &res {
                Ok(outcome) if outcome.is_completed() => {
                    info!(%origin, run_id = %outcome.id, "run finished");
                }
                Ok(outcome) => {
                    warn!(%origin, run_id = %outcome.id, status = %outcome.status, "run did not complete");
                }
                Err(CleanupError::AlreadyRunning) => {
                    warn!(%origin, "run skipped: another cleanup is in progress");
                }
                Err(e) => {
                    error!(%origin, error = %e, "run failed");
                }
            }
            res
        })
    }
}
