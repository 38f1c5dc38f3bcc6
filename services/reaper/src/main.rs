//! pod-reaper
//!
//! Reaps pods that match every configured rule, on a schedule.

use std::sync::Arc;

use anyhow::Result;
use pod_reaper::{Config, KubeClient, LogConfig, LogFormat, ReapWorker, Reaper, TracingReapLog};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn init_tracing(log: &LogConfig) {
    let fmt = match log.format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
    };

    // Prefer RUST_LOG, fall back to LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log.level.clone().into()))
        .with(fmt)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let log = LogConfig::from_env()?;
    init_tracing(&log);

    info!("Starting pod-reaper");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    let options = &config.options;
    info!(
        namespace = %options.namespace,
        schedule = %options.schedule,
        run_duration = ?options.run_duration,
        grace_period_secs = ?options.grace_period,
        evict = options.evict,
        dry_run = options.dry_run,
        max_pods = options.max_pods,
        sorting = %options.sorting,
        label_selector = %options.label_selector(),
        api_url = %config.kube.api_url,
        "Configuration loaded"
    );
    for description in options.rules.descriptions() {
        info!(rule = %description, "Loaded rule");
    }

    let store = match KubeClient::new(&config.kube) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e.into());
        }
    };

    let reaper = Reaper::new(store, config.options, Arc::new(TracingReapLog));
    let worker = ReapWorker::new(reaper);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker_handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
            (&mut worker_handle).await
        }
        result = &mut worker_handle => result,
    };

    match result {
        Ok(Ok(summary)) => {
            info!(
                cycles = summary.cycles,
                reaped = summary.reaped,
                "pod-reaper shutdown complete"
            );
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "Reap cycle failed");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "Reap worker panicked");
            Err(e.into())
        }
    }
}
