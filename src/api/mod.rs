//! HTTP surface consumed by the dashboard.

mod control;
pub mod error;
mod noise_cancel;
mod readings;
mod settings;
mod volume;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    db::Database, monitor::AudioLevelMonitor, process::ProcessController,
    sampler::VolumeSampler, settings::SettingsStore,
};

pub use error::ApiError;

/// Components shared by every handler. All fields are cheap clones of
/// shared handles.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sampler: VolumeSampler,
    pub monitor: AudioLevelMonitor,
    pub process: ProcessController,
    pub settings: Arc<SettingsStore>,
}

impl AppState {
    /// Starts the microphone and feeds each level into the sampler mailbox,
    /// flagged active while noise cancellation runs.
    pub async fn start_monitoring(&self) -> bool {
        let sampler = self.sampler.clone();
        let process = self.process.clone();
        self.monitor
            .start_monitoring(move |level| {
                sampler.update_volume(level, level, process.is_running());
            })
            .await
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/noise-cancel",
            get(noise_cancel::status).post(noise_cancel::control),
        )
        .route(
            "/readings",
            get(readings::list_readings)
                .post(readings::create_reading)
                .delete(readings::purge_readings),
        )
        .route("/readings/stats", get(readings::reading_stats))
        .route("/readings/recent", get(readings::recent_readings))
        .route("/volume", get(volume::current).put(volume::update))
        .route("/volume/log", post(volume::log_now))
        .route("/sampler", post(volume::control_sampler))
        .route("/monitor", post(volume::control_monitor))
        .route(
            "/settings",
            get(settings::get_settings).put(settings::put_settings),
        )
        .with_state(state)
}
