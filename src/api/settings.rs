use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use super::{error::ApiError, AppState};
use crate::settings::UserSettings;

fn validate_clock_time(value: &str, field: &str) -> Result<(), ApiError> {
    let invalid = || ApiError::Validation(format!("{field} must be HH:MM, got '{value}'"));

    let (hours, minutes) = value.split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: u8 = hours.parse().map_err(|_| invalid())?;
    let minutes: u8 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(())
}

pub async fn get_settings(State(state): State<AppState>) -> Json<UserSettings> {
    Json(state.settings.get())
}

pub async fn put_settings(
    State(state): State<AppState>,
    payload: Result<Json<UserSettings>, JsonRejection>,
) -> Result<Json<UserSettings>, ApiError> {
    let Json(mut settings) = payload?;
    validate_clock_time(&settings.schedule.start, "schedule.start")?;
    validate_clock_time(&settings.schedule.end, "schedule.end")?;

    settings.location = settings.location.trim().to_string();
    if settings.location.is_empty() {
        return Err(ApiError::Validation("location must not be empty".into()));
    }

    state
        .settings
        .update(settings.clone())
        .map_err(ApiError::internal("Failed to save settings"))?;
    state.sampler.set_location(settings.location.clone());

    Ok(Json(settings))
}
