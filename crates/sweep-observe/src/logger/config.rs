use std::io::IsTerminal;

use crate::logger::{error::LoggerError, file::FileLogConfig, format::LoggerFormat};

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `sweep_core=debug,info`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
    /// Rotating JSON files in addition to the console output.
    pub file: Option<FileLogConfig>,
}

impl LoggerConfig {
    /// Build from the textual `LOG_FORMAT` / `LOG_LEVEL` settings.
    pub fn from_settings(format: &str, level: &str) -> Result<Self, LoggerError> {
        let level = level.trim();
        Ok(Self {
            format: format.parse()?,
            level: if level.is_empty() { "info".into() } else { level.to_ascii_lowercase() },
            ..Self::default()
        })
    }

    pub fn with_file(mut self, file: FileLogConfig) -> Self {
        self.file = Some(file);
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: false,
            use_color: std::io::stdout().is_terminal(),
            file: None,
        }
    }
}
