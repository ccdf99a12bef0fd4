mod config;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use sweep_api::{EngineApiAdapter, HttpApi, VersionInfo};
use sweep_core::{
    CleanupEngine, MetricsExport, ResultStore, RunLauncher, Scheduler, TimestampFormatter,
};
use sweep_exec::{CrictlConfig, CrictlRepository};
use sweep_notify::{TelegramConfig, TelegramNotifier};
use sweep_observe::logger_init;
use sweep_prometheus::PrometheusMetrics;
use sweep_store::SqliteResultStore;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, mask_value};

/// Time given to the HTTP server and the scheduler to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Configuration
    let cfg = Config::load().context("load configuration")?;
    cfg.validate().context("validate configuration")?;

    // 2) Logger
    let log_cfg = cfg.logger()?;
    let _log_guard = logger_init(&log_cfg)?;
    info!(
        telegram_bot_token = %mask_value(&cfg.telegram_bot_token),
        telegram_chat_id = %mask_value(&cfg.telegram_chat_id),
        schedule = %cfg.cleanup_schedule,
        workers = cfg.workers,
        http_port = cfg.http_port,
        log_format = %log_cfg.format,
        log_level = %log_cfg.level,
        log_dir = ?cfg.log_dir,
        results_db = ?cfg.results_db_path,
        "configuration loaded"
    );

    // 3) Adapters
    let metrics = Arc::new(PrometheusMetrics::new().context("register metrics")?);
    let repo = Arc::new(CrictlRepository::new(CrictlConfig {
        program: cfg.crictl_path.clone(),
        runtime_endpoint: cfg.runtime_endpoint.clone(),
    }));
    let notifier = Arc::new(
        TelegramNotifier::new(
            TelegramConfig::new(&cfg.telegram_bot_token, &cfg.telegram_chat_id)
                .with_api_url(&cfg.telegram_api_url),
        )
        .context("build telegram client")?,
    );
    let store: Option<Arc<dyn ResultStore>> = match &cfg.results_db_path {
        Some(path) => {
            let store = SqliteResultStore::open(path)
                .with_context(|| format!("open result store {}", path.display()))?;
            info!(path = %path.display(), "result store enabled");
            Some(Arc::new(store))
        }
        None => None,
    };

    // 4) Engine
    let formatter =
        TimestampFormatter::fixed_offset(cfg.display_offset()?, cfg.display_tz_label.clone());
    let mut builder = CleanupEngine::builder(repo, notifier)
        .with_metrics(metrics.clone())
        .with_workers(cfg.workers)
        .with_formatter(formatter);
    if let Some(store) = &store {
        builder = builder.with_store(Arc::clone(store));
    }
    let engine = Arc::new(builder.build());

    let shutdown = CancellationToken::new();
    let launcher = RunLauncher::new(engine, shutdown.clone());

    // 5) Scheduler
    let scheduler = Scheduler::new(cfg.schedule()?, cfg.cleanup_timeout);
    let scheduler_task = tokio::spawn(scheduler.run(launcher.clone(), shutdown.clone()));

    // 6) HTTP
    let mut adapter = EngineApiAdapter::new(launcher, cfg.trigger_timeout);
    if let Some(store) = store {
        adapter = adapter.with_store(store);
    }
    let exporter: Arc<dyn MetricsExport> = metrics.clone();
    let app = HttpApi::new(Arc::new(adapter))
        .with_exporter(Some(exporter))
        .with_metrics(metrics)
        .with_version(VersionInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
        })
        .with_request_timeout(cfg.http_request_timeout)
        .router();

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "http server listening");

    let server_shutdown = shutdown.clone();
    let mut server_task: JoinHandle<std::io::Result<()>> = tokio::spawn(async move {
        sweep_api::axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    // 7) Wait
    let server_done = tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            None
        }
        res = &mut server_task => Some(res),
    };

    // Aborts an in-flight run and stops the scheduler.
    shutdown.cancel();

    let server_res = match server_done {
        Some(res) => Ok(res),
        None => tokio::time::timeout(SHUTDOWN_GRACE, server_task).await,
    };
    let mut failed = false;
    match server_res {
        Ok(Ok(Ok(()))) => info!("http server stopped"),
        Ok(Ok(Err(e))) => {
            error!(error = %e, "http server failed");
            failed = true;
        }
        Ok(Err(e)) => {
            error!(error = %e, "http server task panicked");
            failed = true;
        }
        Err(_) => warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "http server did not stop in time"),
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, scheduler_task).await.is_err() {
        warn!("scheduler did not stop in time");
    }

    if failed {
        anyhow::bail!("http server terminated unexpectedly");
    }
    info!("agent stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
