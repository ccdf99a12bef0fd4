mod config;
mod error;
mod file;
mod format;
mod log;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use file::{FileLogConfig, LogRotation, LoggerGuard};
pub use format::LoggerFormat;

/// Install the global subscriber described by `cfg`.
///
/// The returned guard flushes file output on drop; keep it for the life of the process.
/// A second call in the same process fails with [`LoggerError::AlreadyInitialized`].
pub fn logger_init(cfg: &LoggerConfig) -> Result<LoggerGuard, LoggerError> {
    log::install(cfg)
}
