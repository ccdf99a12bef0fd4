use std::{
    collections::HashMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use sweep_core::{DEFAULT_WORKERS, Schedule};
use sweep_observe::{FileLogConfig, LogRotation, LoggerConfig, LoggerError};
use thiserror::Error;
use time::{UtcOffset, macros::format_description};

/// Env file read before the process environment.
pub const DEFAULT_ENV_FILE: &str = "/etc/image-cleanup/.env";

/// Overrides [`DEFAULT_ENV_FILE`].
pub const ENV_FILE_VAR: &str = "IMAGE_CLEANUP_ENV_FILE";

const MAX_WORKERS: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}:{line}: expected KEY=VALUE")]
    Syntax { path: PathBuf, line: usize },
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Agent settings.
#[derive(Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub telegram_api_url: String,
    pub cleanup_schedule: String,
    /// Deadline of scheduled runs.
    pub cleanup_timeout: Duration,
    /// Deadline of runs triggered over HTTP.
    pub trigger_timeout: Duration,
    pub workers: usize,
    pub http_port: u16,
    pub http_request_timeout: Duration,
    pub log_level: String,
    pub log_format: String,
    /// Enables rotating `service` and `error` log files when set.
    pub log_dir: Option<PathBuf>,
    pub log_rotation: String,
    pub log_max_backups: usize,
    /// Enables the SQLite result store when set.
    pub results_db_path: Option<PathBuf>,
    pub crictl_path: PathBuf,
    pub runtime_endpoint: Option<String>,
    pub display_utc_offset: String,
    pub display_tz_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            telegram_api_url: "https://api.telegram.org".into(),
            cleanup_schedule: "0 0 * * *".into(),
            cleanup_timeout: Duration::from_secs(1800),
            trigger_timeout: Duration::from_secs(300),
            workers: DEFAULT_WORKERS,
            http_port: 8080,
            http_request_timeout: Duration::from_secs(30),
            log_level: "info".into(),
            log_format: "text".into(),
            log_dir: None,
            log_rotation: "daily".into(),
            log_max_backups: 5,
            results_db_path: None,
            crictl_path: PathBuf::from("crictl"),
            runtime_endpoint: None,
            display_utc_offset: "+07:00".into(),
            display_tz_label: "ICT".into(),
        }
    }
}

impl Config {
    /// Read the env file named by [`ENV_FILE_VAR`] (or the default one), then overlay the
    /// process environment. A missing env file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(ENV_FILE_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE));

        let mut vars = match read_env_file(&path) {
            Ok(vars) => vars,
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                HashMap::new()
            }
            Err(e) => return Err(e),
        };
        vars.extend(std::env::vars());

        Self::from_vars(&vars)
    }

    /// Build from a flat key/value map; absent keys keep their defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let mut cfg = Config::default();

        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            cfg.telegram_bot_token = v.to_string();
        }
        if let Some(v) = get("TELEGRAM_CHAT_ID") {
            cfg.telegram_chat_id = v.to_string();
        }
        if let Some(v) = get("TELEGRAM_API_URL") {
            cfg.telegram_api_url = v.to_string();
        }
        if let Some(v) = get("CLEANUP_SCHEDULE") {
            cfg.cleanup_schedule = v.to_string();
        }
        if let Some(v) = get("CLEANUP_TIMEOUT_SECS") {
            cfg.cleanup_timeout = Duration::from_secs(parse_number("CLEANUP_TIMEOUT_SECS", v)?);
        }
        if let Some(v) = get("TRIGGER_TIMEOUT_SECS") {
            cfg.trigger_timeout = Duration::from_secs(parse_number("TRIGGER_TIMEOUT_SECS", v)?);
        }
        if let Some(v) = get("CLEANUP_WORKERS") {
            cfg.workers = parse_number("CLEANUP_WORKERS", v)?;
        }
        if let Some(v) = get("HTTP_PORT") {
            cfg.http_port = parse_number("HTTP_PORT", v)?;
        }
        if let Some(v) = get("HTTP_REQUEST_TIMEOUT_SECS") {
            cfg.http_request_timeout =
                Duration::from_secs(parse_number("HTTP_REQUEST_TIMEOUT_SECS", v)?);
        }
        if let Some(v) = get("LOG_LEVEL") {
            cfg.log_level = v.to_string();
        }
        if let Some(v) = get("LOG_FORMAT") {
            cfg.log_format = v.to_string();
        }
        cfg.log_dir = get("LOG_DIR").map(PathBuf::from);
        if let Some(v) = get("LOG_ROTATION") {
            cfg.log_rotation = v.to_string();
        }
        if let Some(v) = get("LOG_MAX_BACKUPS") {
            cfg.log_max_backups = parse_number("LOG_MAX_BACKUPS", v)?;
        }
        cfg.results_db_path = get("RESULTS_DB_PATH").map(PathBuf::from);
        if let Some(v) = get("CRICTL_PATH") {
            cfg.crictl_path = PathBuf::from(v);
        }
        cfg.runtime_endpoint = get("CONTAINER_RUNTIME_ENDPOINT").map(str::to_string);
        if let Some(v) = get("DISPLAY_UTC_OFFSET") {
            cfg.display_utc_offset = v.to_string();
        }
        if let Some(v) = get("DISPLAY_TZ_LABEL") {
            cfg.display_tz_label = v.to_string();
        }

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_bot_token.is_empty() {
            return Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
        }
        if self.telegram_chat_id.is_empty() {
            return Err(ConfigError::Missing("TELEGRAM_CHAT_ID"));
        }

        self.schedule()?;
        self.display_offset()?;
        self.logger()?;

        if self.log_max_backups == 0 {
            return Err(invalid("LOG_MAX_BACKUPS", "0", "must be greater than zero"));
        }

        if self.http_port == 0 {
            return Err(invalid("HTTP_PORT", "0", "must be within 1..=65535"));
        }
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(invalid(
                "CLEANUP_WORKERS",
                self.workers.to_string(),
                format!("must be within 1..={MAX_WORKERS}"),
            ));
        }
        for (key, value) in [
            ("CLEANUP_TIMEOUT_SECS", self.cleanup_timeout),
            ("TRIGGER_TIMEOUT_SECS", self.trigger_timeout),
            ("HTTP_REQUEST_TIMEOUT_SECS", self.http_request_timeout),
        ] {
            if value.is_zero() {
                return Err(invalid(key, "0", "must be greater than zero"));
            }
        }
        Ok(())
    }

    pub fn schedule(&self) -> Result<Schedule, ConfigError> {
        Schedule::parse(&self.cleanup_schedule)
            .map_err(|e| invalid("CLEANUP_SCHEDULE", &self.cleanup_schedule, e.to_string()))
    }

    /// Logger settings; file output is enabled by `LOG_DIR`.
    pub fn logger(&self) -> Result<LoggerConfig, ConfigError> {
        let cfg = LoggerConfig::from_settings(&self.log_format, &self.log_level)
            .map_err(|e| invalid("LOG_FORMAT", &self.log_format, e.to_string()))?;
        let Some(dir) = &self.log_dir else {
            return Ok(cfg);
        };
        let rotation: LogRotation = self
            .log_rotation
            .parse()
            .map_err(|e: LoggerError| invalid("LOG_ROTATION", &self.log_rotation, e.to_string()))?;
        Ok(cfg.with_file(
            FileLogConfig::new(dir)
                .with_rotation(rotation)
                .with_max_files(self.log_max_backups),
        ))
    }

    /// Offset used to render times in notifications, e.g. `+07:00`.
    pub fn display_offset(&self) -> Result<UtcOffset, ConfigError> {
        let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
        UtcOffset::parse(&self.display_utc_offset, format).map_err(|e| {
            invalid("DISPLAY_UTC_OFFSET", &self.display_utc_offset, e.to_string())
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &mask_value(&self.telegram_bot_token))
            .field("telegram_chat_id", &mask_value(&self.telegram_chat_id))
            .field("telegram_api_url", &self.telegram_api_url)
            .field("cleanup_schedule", &self.cleanup_schedule)
            .field("cleanup_timeout", &self.cleanup_timeout)
            .field("trigger_timeout", &self.trigger_timeout)
            .field("workers", &self.workers)
            .field("http_port", &self.http_port)
            .field("http_request_timeout", &self.http_request_timeout)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("log_dir", &self.log_dir)
            .field("log_rotation", &self.log_rotation)
            .field("log_max_backups", &self.log_max_backups)
            .field("results_db_path", &self.results_db_path)
            .field("crictl_path", &self.crictl_path)
            .field("runtime_endpoint", &self.runtime_endpoint)
            .field("display_utc_offset", &self.display_utc_offset)
            .field("display_tz_label", &self.display_tz_label)
            .finish()
    }
}

/// Hide a secret for logging: values up to 8 chars become `********`, longer ones keep
/// their first and last 4 chars.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped, an `export ` prefix
/// and matching surrounding quotes are stripped.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_env(&content).map_err(|line| ConfigError::Syntax {
        path: path.to_path_buf(),
        line,
    })
}

/// Err carries the 1-based line number.
fn parse_env(content: &str) -> Result<HashMap<String, String>, usize> {
    let mut vars = HashMap::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            return Err(idx + 1);
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(idx + 1);
        }
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.into(),
        reason: reason.into(),
    }
}
