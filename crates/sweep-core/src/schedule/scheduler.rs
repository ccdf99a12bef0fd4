use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Schedule;
use crate::launcher::{RunLauncher, RunOrigin};

/// Fires detached cleanup runs according to a [`Schedule`].
#[derive(Debug, Clone)]
pub struct Scheduler {
    schedule: Schedule,
    offset: UtcOffset,
    timeout: Duration,
}

impl Scheduler {
    /// Evaluate `schedule` in the host local offset, UTC if it cannot be determined.
    pub fn new(schedule: Schedule, timeout: Duration) -> Self {
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        Self {
            schedule,
            offset,
            timeout,
        }
    }

    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Loop until `shutdown` is cancelled.
    ///
    /// Runs never overlap: a fire time that finds a run still active is skipped by the
    /// engine's admission guard.
    pub async fn run(self, launcher: RunLauncher, shutdown: CancellationToken) {
        info!(schedule = %self.schedule, offset = %self.offset, "scheduler started");

        let mut last_fire: Option<OffsetDateTime> = None;
        loop {
            let now = OffsetDateTime::now_utc().to_offset(self.offset);
            let from = last_fire.map_or(now, |last| last.max(now));
            let Some(next) = self.schedule.next_after(from) else {
                warn!(schedule = %self.schedule, "schedule has no upcoming fire time");
                return;
            };
            let wait = Duration::try_from(next - now).unwrap_or_default();
            debug!(next = %next, wait_secs = wait.as_secs(), "next cleanup scheduled");

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            last_fire = Some(next);
            launcher.launch(RunOrigin::Scheduled, self.timeout);
        }
    }
}
