use axum::{extract::rejection::JsonRejection, extract::State, Json};

use super::{
    control::{Action, ActionBody, ControlResponse},
    error::ApiError,
    AppState,
};
use crate::process::ProcessStatus;

pub async fn control(
    State(state): State<AppState>,
    payload: Result<Json<ActionBody>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let Json(body) = payload?;

    match body.action()? {
        Action::Start => {
            let pid = state
                .process
                .start()
                .await
                .map_err(ApiError::internal("Failed to control noise cancellation"))?;
            Ok(Json(ControlResponse {
                pid: Some(pid),
                ..ControlResponse::ok("Noise cancellation started")
            }))
        }
        Action::Stop => {
            if state.process.stop().await {
                Ok(Json(ControlResponse::ok("Noise cancellation stopped")))
            } else {
                Ok(Json(ControlResponse::failed("No process running")))
            }
        }
    }
}

pub async fn status(State(state): State<AppState>) -> Json<ProcessStatus> {
    Json(state.process.status().await)
}
