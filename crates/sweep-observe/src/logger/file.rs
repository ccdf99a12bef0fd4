use std::{fmt, path::PathBuf, str::FromStr};

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};

use crate::logger::error::LoggerError;

/// General log, every event passing the level filter.
pub(crate) const SERVICE_LOG: &str = "service";
/// Error-only log.
pub(crate) const ERROR_LOG: &str = "error";

const DEFAULT_MAX_FILES: usize = 5;

/// When a log file is closed and a new one started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogRotation::Hourly => "hourly",
            LogRotation::Daily => "daily",
            LogRotation::Never => "never",
        }
    }

    fn to_appender(self) -> Rotation {
        match self {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

impl fmt::Display for LogRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogRotation {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(LogRotation::Hourly),
            "" | "daily" => Ok(LogRotation::Daily),
            "never" => Ok(LogRotation::Never),
            _ => Err(LoggerError::InvalidRotation(s.to_string())),
        }
    }
}

/// JSON log files written next to the console output: `service.*.log` with every event
/// and `error.*.log` with errors only.
#[derive(Debug, Clone)]
pub struct FileLogConfig {
    pub dir: PathBuf,
    pub rotation: LogRotation,
    /// Rotated files kept per log, older ones are deleted.
    pub max_files: usize,
}

impl FileLogConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            rotation: LogRotation::Daily,
            max_files: DEFAULT_MAX_FILES,
        }
    }

    pub fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.max(1);
        self
    }

    pub(crate) fn appender(&self, prefix: &str) -> Result<RollingFileAppender, LoggerError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| self.failed(e))?;
        RollingFileAppender::builder()
            .rotation(self.rotation.to_appender())
            .filename_prefix(prefix)
            .filename_suffix("log")
            .max_log_files(self.max_files)
            .build(&self.dir)
            .map_err(|e| self.failed(e))
    }

    fn failed(&self, e: impl fmt::Display) -> LoggerError {
        LoggerError::FileOutput {
            dir: self.dir.display().to_string(),
            reason: e.to_string(),
        }
    }
}

/// Keeps the background log writers alive; pending lines are flushed on drop.
///
/// Hold it until the process exits.
#[must_use = "dropping the guard stops file logging"]
#[derive(Default)]
pub struct LoggerGuard {
    pub(crate) writers: Vec<WorkerGuard>,
}

impl fmt::Debug for LoggerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerGuard")
            .field("writers", &self.writers.len())
            .finish()
    }
}
