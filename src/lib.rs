pub mod api;
pub mod config;
pub mod db;
pub mod monitor;
pub mod process;
pub mod retention;
pub mod sampler;
pub mod schedule;
pub mod settings;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use api::AppState;
use config::Config;
use db::Database;
use monitor::AudioLevelMonitor;
use process::{ProcessCommand, ProcessController};
use sampler::{HttpReadingSink, ReadingSink, SystemClock, VolumeSampler};
use schedule::ScheduleController;
use settings::SettingsStore;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(if config.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    info!("noisedash starting up...");

    let database = Database::new(config.db_path())?;
    let settings = Arc::new(SettingsStore::new(config.settings_path())?);

    let sink: Arc<dyn ReadingSink> = match &config.sampler_endpoint {
        Some(endpoint) => {
            info!("Forwarding sampled readings to {endpoint}");
            Arc::new(HttpReadingSink::new(endpoint.clone()))
        }
        None => Arc::new(database.clone()),
    };
    let sampler = VolumeSampler::new(sink);
    sampler.set_location(settings.get().location);

    let process = ProcessController::new(ProcessCommand::script(
        config.cancel_program.clone(),
        &config.cancel_script,
    ));

    let state = AppState {
        db: database.clone(),
        sampler: sampler.clone(),
        monitor: AudioLevelMonitor::new(),
        process: process.clone(),
        settings: Arc::clone(&settings),
    };

    let schedule = ScheduleController::new(
        Arc::clone(&settings),
        process.clone(),
        Arc::new(SystemClock),
    );
    schedule.start().await;

    let background = CancellationToken::new();
    let retention = config.retention_days.map(|days| {
        retention::spawn_retention_sweep(
            database.clone(),
            days,
            retention::SWEEP_INTERVAL,
            background.child_token(),
        )
    });

    if config.monitor_on_start && !state.start_monitoring().await {
        warn!("Microphone unavailable; continuing without live levels");
    }
    sampler.start_logging().await;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, api::router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down...");
    background.cancel();
    if let Some(handle) = retention {
        let _ = handle.await;
    }
    schedule.stop().await;
    sampler.stop_logging().await;
    state.monitor.stop_monitoring().await;
    process.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
}
