//! Cleanup orchestration.
//!
//! One call to [`CleanupEngine::cleanup`] is one run: admission, inventory reads, partition,
//! bounded-parallel deletion, then metrics, persistence and notification.
mod deletion;

use std::{collections::HashSet, fmt, sync::Arc, time::Instant};

use parking_lot::RwLock;
use sweep_model::{AbortCause, HostInfo, Image, ImageId, RunOutcome, RunStatus};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::{
    admission::AdmissionGuard,
    context::RunContext,
    error::{CleanupError, InventoryError},
    inventory::ImageRepository,
    metrics::{ErrorStage, MetricsBackend, NoOpMetrics},
    notify::Notifier,
    report::{TimestampFormatter, format_summary},
    state::ResultStore,
    system,
};

/// Default size of the deletion worker pool.
pub const DEFAULT_WORKERS: usize = 5;

/// Resolves the descriptor of the host a run executed on.
pub type HostProbe = Arc<dyn Fn() -> HostInfo + Send + Sync>;

/// Drives cleanup runs against one image repository.
pub struct CleanupEngine {
    repo: Arc<dyn ImageRepository>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<dyn MetricsBackend>,
    store: Option<Arc<dyn ResultStore>>,
    formatter: TimestampFormatter,
    host_probe: HostProbe,
    workers: usize,
    guard: AdmissionGuard,
    last: RwLock<Option<RunOutcome>>,
}

impl fmt::Debug for CleanupEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupEngine")
            .field("workers", &self.workers)
            .field("store", &self.store.is_some())
            .field("running", &self.guard.is_active())
            .finish_non_exhaustive()
    }
}

impl CleanupEngine {
    pub fn builder(
        repo: Arc<dyn ImageRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> CleanupEngineBuilder {
        CleanupEngineBuilder::new(repo, notifier)
    }

    /// Whether a run currently holds the admission slot.
    pub fn is_running(&self) -> bool {
        self.guard.is_active()
    }

    /// Outcome of the most recent completed run.
    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.last.read().clone()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute one cleanup run under `ctx`.
    ///
    /// Returns an error only when admission is refused or an inventory read fails or is
    /// interrupted. A run interrupted after the reads returns `Ok` with
    /// [`RunStatus::Aborted`]; such runs are neither persisted nor notified.
    pub async fn cleanup(&self, ctx: &RunContext) -> Result<RunOutcome, CleanupError> {
        let Some(_permit) = self.guard.enter() else {
            return Err(CleanupError::AlreadyRunning);
        };

        let id = uuid::Uuid::new_v4().to_string();
        let started_at = OffsetDateTime::now_utc();
        let clock = Instant::now();
        info!(run_id = %id, "cleanup started");

        let images = self
            .read_inventory(ctx, self.repo.list_images())
            .await?
            .map_err(|e| self.inventory_failed(&id, CleanupError::ListImages(e)))?;
        let in_use = self
            .read_inventory(ctx, self.repo.list_in_use())
            .await?
            .map_err(|e| self.inventory_failed(&id, CleanupError::ListInUse(e)))?;

        let total = images.len();
        let (candidates, skip) = partition(images, &in_use);
        for image in &skip {
            info!(id = %image.id, tags = ?image.tags, "skipping image in use");
        }
        debug!(run_id = %id, total, candidates = candidates.len(), in_use = skip.len(), "inventory partitioned");

        let expected = candidates.len();
        let interrupted = ctx.is_done();
        let tally = if interrupted {
            deletion::Tally::default()
        } else {
            deletion::remove_in_parallel(
                ctx,
                Arc::clone(&self.repo),
                Arc::clone(&self.metrics),
                candidates,
                Arc::new(in_use),
                self.workers,
            )
            .await
        };

        let finished_at = OffsetDateTime::now_utc();
        let duration = clock.elapsed();
        let removed = tally.removed;
        let skipped = skip.len() + tally.skipped;

        self.metrics.images_removed(removed);
        self.metrics.images_skipped(skipped);

        let completed = !interrupted && tally.removed + tally.skipped == expected;
        if !completed {
            let cause = match ctx.cause() {
                Some(cause) => cause,
                None if tally.failed_workers > 0 => {
                    error!(run_id = %id, failed_workers = tally.failed_workers, "deletion workers died");
                    AbortCause::WorkerFailed
                }
                None => AbortCause::Cancelled,
            };
            warn!(
                run_id = %id, %cause, total, removed, skipped,
                unprocessed = total - removed - skipped,
                "cleanup aborted"
            );
            return Ok(RunOutcome {
                id,
                host: HostInfo::unknown(),
                started_at,
                finished_at,
                duration,
                total,
                removed,
                skipped,
                status: RunStatus::Aborted,
                abort_cause: Some(cause),
            });
        }

        let outcome = RunOutcome {
            id,
            host: (self.host_probe)(),
            started_at,
            finished_at,
            duration,
            total,
            removed,
            skipped,
            status: RunStatus::Succeeded,
            abort_cause: None,
        };

        self.metrics.run_duration(duration);
        self.metrics.last_run(finished_at);

        if let Some(store) = &self.store
            && let Err(e) = store.save(&outcome.to_record(OffsetDateTime::now_utc())).await
        {
            error!(run_id = %outcome.id, error = %e, "failed to persist run result");
        }

        self.notify(ctx, &outcome).await;

        *self.last.write() = Some(outcome.clone());
        info!(
            run_id = %outcome.id,
            total, removed, skipped,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "cleanup completed"
        );
        Ok(outcome)
    }

    /// Await an inventory read unless the run is interrupted first.
    async fn read_inventory<T, F>(
        &self,
        ctx: &RunContext,
        read: F,
    ) -> Result<Result<T, InventoryError>, CleanupError>
    where
        F: Future<Output = Result<T, InventoryError>>,
    {
        tokio::select! {
            biased;
            cause = ctx.done() => {
                warn!(%cause, "cleanup interrupted while reading inventory");
                Err(CleanupError::Aborted(cause))
            }
            res = read => Ok(res),
        }
    }

    fn inventory_failed(&self, run_id: &str, err: CleanupError) -> CleanupError {
        self.metrics.error(ErrorStage::Inventory);
        error!(run_id, error = %err, "cleanup failed");
        err
    }

    async fn notify(&self, ctx: &RunContext, outcome: &RunOutcome) {
        let message = format_summary(outcome, &self.formatter);
        let sent = tokio::select! {
            biased;
            cause = ctx.done() => Err(format!("notification interrupted: {cause}")),
            res = self.notifier.send(&message) => res.map_err(|e| e.to_string()),
        };
        if let Err(e) = sent {
            error!(run_id = %outcome.id, error = %e, "failed to send notification");
            self.metrics.error(ErrorStage::Notify);
        }
    }
}

/// Split into deletion candidates and images that are in use, by identifier only.
fn partition(images: Vec<Image>, in_use: &HashSet<ImageId>) -> (Vec<Image>, Vec<Image>) {
    images.into_iter().partition(|img| !in_use.contains(&img.id))
}

/// Builder for [`CleanupEngine`].
pub struct CleanupEngineBuilder {
    repo: Arc<dyn ImageRepository>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<dyn MetricsBackend>,
    store: Option<Arc<dyn ResultStore>>,
    formatter: TimestampFormatter,
    host_probe: HostProbe,
    workers: usize,
}

impl CleanupEngineBuilder {
    fn new(repo: Arc<dyn ImageRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repo,
            notifier,
            metrics: Arc::new(NoOpMetrics),
            store: None,
            formatter: TimestampFormatter::default(),
            host_probe: Arc::new(system::host_info),
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsBackend>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Deletion pool size, at least one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_formatter(mut self, formatter: TimestampFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_host_probe(mut self, probe: HostProbe) -> Self {
        self.host_probe = probe;
        self
    }

    pub fn build(self) -> CleanupEngine {
        CleanupEngine {
            repo: self.repo,
            notifier: self.notifier,
            metrics: self.metrics,
            store: self.store,
            formatter: self.formatter,
            host_probe: self.host_probe,
            workers: self.workers,
            guard: AdmissionGuard::new(),
            last: RwLock::new(None),
        }
    }
}
