use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{AbortCause, HostInfo, RunId, RunRecord, RunStatus};

/// Aggregate produced by one invocation of the cleanup engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    /// Unique run identifier.
    pub id: RunId,
    /// Host the run executed on.
    pub host: HostInfo,
    /// Wall-clock start, UTC.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// Wall-clock end of the deletion phase, UTC.
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    /// Elapsed time measured on the monotonic clock.
    #[serde(with = "crate::duration_ms", rename = "durationMs")]
    pub duration: Duration,
    /// Number of images reported by the runtime.
    pub total: usize,
    /// Images deleted in this run.
    pub removed: usize,
    /// Images left in place: in use, or deletion failed.
    pub skipped: usize,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_cause: Option<AbortCause>,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// Candidates that were neither removed nor skipped.
    ///
    /// Always zero for a completed run.
    pub fn unprocessed(&self) -> usize {
        self.total.saturating_sub(self.removed + self.skipped)
    }

    /// Build the persisted form of this outcome.
    pub fn to_record(&self, created_at: OffsetDateTime) -> RunRecord {
        RunRecord {
            id: self.id.clone(),
            host_info: self.host.to_string(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration: self.duration,
            total: self.total,
            removed: self.removed,
            skipped: self.skipped,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: RunStatus) -> RunOutcome {
        RunOutcome {
            id: "run-1".into(),
            host: HostInfo::unknown(),
            started_at: OffsetDateTime::UNIX_EPOCH,
            finished_at: OffsetDateTime::UNIX_EPOCH + Duration::from_secs(3),
            duration: Duration::from_millis(3_250),
            total: 4,
            removed: 1,
            skipped: 1,
            status,
            abort_cause: None,
        }
    }

    #[test]
    fn unprocessed_counts_leftovers() {
        let o = outcome(RunStatus::Aborted);
        assert_eq!(o.unprocessed(), 2);
        assert!(!o.is_completed());
    }

    #[test]
    fn record_carries_counts_and_host_descriptor() {
        let o = outcome(RunStatus::Succeeded);
        let rec = o.to_record(OffsetDateTime::UNIX_EPOCH);
        assert_eq!(rec.id, "run-1");
        assert_eq!(rec.host_info, "Unknown host");
        assert_eq!(rec.duration, Duration::from_millis(3_250));
        assert_eq!((rec.total, rec.removed, rec.skipped), (4, 1, 1));
    }

    #[test]
    fn json_uses_rfc3339_and_millis() {
        let json = serde_json::to_string(&outcome(RunStatus::Succeeded)).unwrap();
        assert!(json.contains(r#""startedAt":"1970-01-01T00:00:00Z""#));
        assert!(json.contains(r#""durationMs":3250"#));
        assert!(!json.contains("abortCause"));
    }
}
