use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;
use sweep_model::{Image, ImageId};
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc},
    task::JoinSet,
};
use tracing::{debug, error, info, warn};

use crate::{
    context::RunContext,
    inventory::ImageRepository,
    metrics::{ErrorStage, MetricsBackend},
};

/// Counts accumulated by the deletion workers of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tally {
    pub removed: usize,
    pub skipped: usize,
    /// Workers that ended with a panic instead of returning.
    pub failed_workers: usize,
}

/// Delete `candidates` with a fixed pool of `workers` tasks.
///
/// Stops dispatching once `ctx` is done; workers finish their current image and exit.
/// Returns only after every worker has been joined.
pub(crate) async fn remove_in_parallel(
    ctx: &RunContext,
    repo: Arc<dyn ImageRepository>,
    metrics: Arc<dyn MetricsBackend>,
    candidates: Vec<Image>,
    in_use: Arc<HashSet<ImageId>>,
    workers: usize,
) -> Tally {
    let workers = workers.max(1);
    let tally = Arc::new(Mutex::new(Tally::default()));
    let (tx, rx) = mpsc::channel::<Image>(workers);
    let rx = Arc::new(AsyncMutex::new(rx));

    let mut set = JoinSet::new();
    for worker in 0..workers {
        set.spawn(worker_loop(
            worker,
            ctx.clone(),
            Arc::clone(&repo),
            Arc::clone(&metrics),
            Arc::clone(&rx),
            Arc::clone(&in_use),
            Arc::clone(&tally),
        ));
    }
    // Workers own the receiver; if they all die, `send` fails instead of blocking.
    drop(rx);

    let mut dispatched = 0usize;
    for image in candidates {
        tokio::select! {
            biased;
            cause = ctx.done() => {
                warn!(%cause, dispatched, "stopping dispatch");
                break;
            }
            sent = tx.send(image) => {
                if sent.is_err() {
                    break;
                }
                dispatched += 1;
            }
        }
    }
    drop(tx);

    let mut failed_workers = 0;
    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            error!(error = %e, "deletion worker failed");
            failed_workers += 1;
        }
    }

    let mut tally = *tally.lock();
    tally.failed_workers = failed_workers;
    tally
}

async fn worker_loop(
    worker: usize,
    ctx: RunContext,
    repo: Arc<dyn ImageRepository>,
    metrics: Arc<dyn MetricsBackend>,
    rx: Arc<AsyncMutex<mpsc::Receiver<Image>>>,
    in_use: Arc<HashSet<ImageId>>,
    tally: Arc<Mutex<Tally>>,
) {
    loop {
        if ctx.is_done() {
            debug!(worker, "context done, worker exiting");
            return;
        }
        let next = rx.lock().await.recv().await;
        let Some(image) = next else {
            return;
        };
        if ctx.is_done() {
            debug!(worker, id = %image.id, "context done, image left untouched");
            return;
        }

        if in_use.contains(&image.id) {
            info!(id = %image.id, tags = ?image.tags, "skipping image in use");
            tally.lock().skipped += 1;
            continue;
        }

        match repo.remove_image(&image.id).await {
            Ok(()) => {
                info!(id = %image.id, tags = ?image.tags, "removed image");
                tally.lock().removed += 1;
            }
            Err(e) => {
                error!(id = %image.id, tags = ?image.tags, error = %e, "failed to remove image");
                metrics.error(ErrorStage::Delete);
                tally.lock().skipped += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InventoryError, NoOpMetrics};
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingRepo {
        deleted: Mutex<Vec<ImageId>>,
        panic_on: Option<ImageId>,
    }

    #[async_trait]
    impl ImageRepository for RecordingRepo {
        async fn list_images(&self) -> Result<Vec<Image>, InventoryError> {
            Ok(Vec::new())
        }

        async fn list_in_use(&self) -> Result<HashSet<ImageId>, InventoryError> {
            Ok(HashSet::new())
        }

        async fn remove_image(&self, id: &str) -> Result<(), InventoryError> {
            if self.panic_on.as_deref() == Some(id) {
                panic!("runtime client crashed on {id}");
            }
            self.deleted.lock().push(id.to_string());
            Ok(())
        }
    }

    fn images(ids: &[&str]) -> Vec<Image> {
        ids.iter().map(|id| Image::untagged(*id)).collect()
    }

    #[tokio::test]
    async fn worker_skips_candidate_that_is_in_use() {
        let repo = Arc::new(RecordingRepo::default());
        let in_use: HashSet<ImageId> = ["1".to_string()].into_iter().collect();

        let tally = remove_in_parallel(
            &RunContext::background(),
            repo.clone(),
            Arc::new(NoOpMetrics),
            images(&["1", "2"]),
            Arc::new(in_use),
            2,
        )
        .await;

        assert_eq!(tally.removed, 1);
        assert_eq!(tally.skipped, 1);
        assert_eq!(*repo.deleted.lock(), ["2".to_string()]);
    }

    #[tokio::test]
    async fn cancelled_context_dispatches_nothing() {
        let repo = Arc::new(RecordingRepo::default());
        let ctx = RunContext::background();
        ctx.cancel();

        let tally = remove_in_parallel(
            &ctx,
            repo.clone(),
            Arc::new(NoOpMetrics),
            images(&["1", "2", "3"]),
            Arc::new(HashSet::new()),
            3,
        )
        .await;

        assert_eq!(tally, Tally::default());
        assert!(repo.deleted.lock().is_empty());
    }

    #[tokio::test]
    async fn panicked_worker_is_counted() {
        let repo = Arc::new(RecordingRepo {
            panic_on: Some("bad".into()),
            ..Default::default()
        });

        let tally = remove_in_parallel(
            &RunContext::background(),
            repo.clone(),
            Arc::new(NoOpMetrics),
            images(&["bad", "a", "b", "c"]),
            Arc::new(HashSet::new()),
            1,
        )
        .await;

        assert_eq!(tally.failed_workers, 1);
        assert_eq!(tally.removed + tally.skipped, 0);
        assert!(repo.deleted.lock().is_empty());
    }
}
