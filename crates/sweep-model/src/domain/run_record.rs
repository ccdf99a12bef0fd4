use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::RunId;

/// Persisted summary of a completed cleanup run.
///
/// All timestamps are kept in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: RunId,
    /// Host descriptor as rendered for humans.
    pub host_info: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    #[serde(with = "crate::duration_ms", rename = "durationMs")]
    pub duration: Duration,
    pub total: usize,
    pub removed: usize,
    pub skipped: usize,
    /// When the record was written.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::UtcOffset;

    #[test]
    fn serde_roundtrip_keeps_instant() {
        let local = OffsetDateTime::UNIX_EPOCH
            .to_offset(UtcOffset::from_hms(7, 0, 0).unwrap());
        let rec = RunRecord {
            id: "r1".into(),
            host_info: "Host: a\nIP(s): ".into(),
            started_at: local,
            finished_at: local,
            duration: Duration::from_millis(42),
            total: 3,
            removed: 2,
            skipped: 1,
            created_at: local,
        };

        let json = serde_json::to_string(&rec).unwrap();
        let back: RunRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.started_at, rec.started_at);
        assert_eq!(back.duration, rec.duration);
        assert_eq!(back.host_info, rec.host_info);
    }
}
