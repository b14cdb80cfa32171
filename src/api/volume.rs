use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{
    control::{Action, ActionBody, ControlResponse},
    error::ApiError,
    AppState,
};
use crate::sampler::NoiseType;

/// What the dashboard polls: the latest levels plus the loop states.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshot {
    pub volume: f64,
    pub ambient: f64,
    pub is_active: bool,
    pub noise_type: NoiseType,
    pub is_logging: bool,
    pub is_monitoring: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelsBody {
    pub volume: f64,
    pub ambient: f64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub noise_type: Option<String>,
}

async fn snapshot(state: &AppState) -> VolumeSnapshot {
    let levels = state.sampler.current();
    VolumeSnapshot {
        volume: levels.volume,
        ambient: levels.ambient,
        is_active: levels.is_active,
        noise_type: levels.noise_type(),
        is_logging: state.sampler.is_logging().await,
        is_monitoring: state.monitor.is_monitoring(),
    }
}

pub async fn current(State(state): State<AppState>) -> Json<VolumeSnapshot> {
    Json(snapshot(&state).await)
}

pub async fn update(
    State(state): State<AppState>,
    payload: Result<Json<LevelsBody>, JsonRejection>,
) -> Result<Json<VolumeSnapshot>, ApiError> {
    let Json(body) = payload?;
    state
        .sampler
        .update_volume(body.volume, body.ambient, body.is_active);
    Ok(Json(snapshot(&state).await))
}

pub async fn log_now(
    State(state): State<AppState>,
    payload: Result<Json<LevelsBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = payload?;
    state
        .sampler
        .log_immediate(body.volume, body.ambient, body.is_active, body.noise_type)
        .await;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn control_sampler(
    State(state): State<AppState>,
    payload: Result<Json<ActionBody>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let Json(body) = payload?;

    let response = match body.action()? {
        Action::Start => {
            state.sampler.start_logging().await;
            ControlResponse::ok("Volume logging started")
        }
        Action::Stop => {
            state.sampler.stop_logging().await;
            ControlResponse::ok("Volume logging stopped")
        }
    };
    Ok(Json(response))
}

pub async fn control_monitor(
    State(state): State<AppState>,
    payload: Result<Json<ActionBody>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let Json(body) = payload?;

    let response = match body.action()? {
        Action::Start => {
            if state.start_monitoring().await {
                ControlResponse::ok("Audio monitoring started")
            } else {
                ControlResponse::failed("Microphone unavailable")
            }
        }
        Action::Stop => {
            state.monitor.stop_monitoring().await;
            ControlResponse::ok("Audio monitoring stopped")
        }
    };
    Ok(Json(response))
}
