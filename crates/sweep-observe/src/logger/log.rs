use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::LevelFilter,
    fmt,
    fmt::time::OffsetTime,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::logger::{
    config::LoggerConfig,
    error::LoggerError,
    file::{ERROR_LOG, FileLogConfig, LoggerGuard, SERVICE_LOG},
    format::LoggerFormat,
};

/// Registry with the level filter applied; every output layer sits on top of it.
type Filtered = Layered<EnvFilter, Registry>;

type OutputLayer = Box<dyn Layer<Filtered> + Send + Sync + 'static>;

pub(crate) fn install(cfg: &LoggerConfig) -> Result<LoggerGuard, LoggerError> {
    let filter = parse_directives(&cfg.level)?;
    let mut guard = LoggerGuard::default();

    let mut outputs = vec![console_output(cfg)?];
    if let Some(file) = &cfg.file {
        outputs.extend(file_outputs(file, &mut guard)?);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(outputs)
        .try_init()
        .map_err(|e| {
            let msg = e.to_string();
            // Both the log bridge and the dispatcher report a second install as "already set".
            if msg.contains("already") {
                LoggerError::AlreadyInitialized
            } else {
                LoggerError::InitializationFailed(msg)
            }
        })?;
    Ok(guard)
}

fn console_output(cfg: &LoggerConfig) -> Result<OutputLayer, LoggerError> {
    Ok(match cfg.format {
        LoggerFormat::Text => fmt::layer()
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(local_rfc3339())
            .boxed(),
        LoggerFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_timer(local_rfc3339())
            .boxed(),
        LoggerFormat::Journald => journald_output()?,
    })
}

/// JSON lines into `service` (all events) and `error` (errors only) files.
fn file_outputs(
    cfg: &FileLogConfig,
    guard: &mut LoggerGuard,
) -> Result<Vec<OutputLayer>, LoggerError> {
    let (service, service_guard) = tracing_appender::non_blocking(cfg.appender(SERVICE_LOG)?);
    let (errors, errors_guard) = tracing_appender::non_blocking(cfg.appender(ERROR_LOG)?);
    guard.writers.extend([service_guard, errors_guard]);

    Ok(vec![
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_ansi(false)
            .with_timer(local_rfc3339())
            .with_writer(service)
            .boxed(),
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_ansi(false)
            .with_timer(local_rfc3339())
            .with_writer(errors)
            .with_filter(LevelFilter::ERROR)
            .boxed(),
    ])
}

fn parse_directives(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::builder()
        .parse(level)
        .map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

/// Local offset when the platform reports one, UTC otherwise.
fn local_rfc3339() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_output() -> Result<OutputLayer, LoggerError> {
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?
        .with_syslog_identifier("image-cleanup".to_string());
    Ok(layer.boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_output() -> Result<OutputLayer, LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}
