use std::fmt;

use serde::{Deserialize, Serialize};

/// How a cleanup run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Every candidate was processed. Individual deletion failures do not change this.
    Succeeded,
    /// The run context was cancelled or hit its deadline before the run finished.
    Aborted,
}

/// Why a run was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbortCause {
    /// Cancelled from outside (process shutdown).
    Cancelled,
    /// The run deadline elapsed.
    DeadlineExceeded,
    /// A deletion worker died before the queue was drained.
    WorkerFailed,
}

impl RunStatus {
    /// Returns `true` if the run went through to the end.
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Aborted => "aborted",
        }
    }
}

impl AbortCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortCause::Cancelled => "cancelled",
            AbortCause::DeadlineExceeded => "deadline exceeded",
            AbortCause::WorkerFailed => "worker failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_states() {
        assert!(RunStatus::Succeeded.is_completed());
        assert!(!RunStatus::Aborted.is_completed());
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Aborted).unwrap(),
            r#""aborted""#
        );
        assert_eq!(
            serde_json::to_string(&AbortCause::DeadlineExceeded).unwrap(),
            r#""deadlineExceeded""#
        );
    }
}
