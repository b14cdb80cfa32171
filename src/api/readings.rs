use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{error::ApiError, AppState};
use crate::db::{
    helpers::{ensure_storable, parse_flexible_datetime},
    NewVolumeReading, VolumeHistoryData, VolumeReading, VolumeStats, DEFAULT_HISTORY_LIMIT,
    DEFAULT_RECENT_LIMIT, DEFAULT_RETENTION_DAYS, MAX_RETENTION_DAYS,
};

const MISSING_FIELDS: &str = "Missing required fields: timestamp, volume, ambient";

/// Incoming `POST /readings` body. Every field is optional here so that a
/// missing one produces the fixed validation message instead of a serde
/// rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReadingBody {
    /// RFC 3339 string, `YYYY-MM-DD`, or epoch milliseconds.
    pub timestamp: Option<Value>,
    pub volume: Option<f64>,
    pub ambient: Option<f64>,
    pub is_active: Option<bool>,
    pub noise_type: Option<String>,
    pub location: Option<String>,
}

impl CreateReadingBody {
    pub fn into_new_reading(self) -> Result<NewVolumeReading, ApiError> {
        let (Some(timestamp), Some(volume), Some(ambient)) =
            (self.timestamp, self.volume, self.ambient)
        else {
            return Err(ApiError::Validation(MISSING_FIELDS.into()));
        };

        Ok(NewVolumeReading {
            timestamp: Some(parse_timestamp(&timestamp)?),
            volume,
            ambient,
            is_active: self.is_active.unwrap_or(false),
            noise_type: self.noise_type,
            location: self.location,
        })
    }
}

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, ApiError> {
    match value {
        Value::String(text) if text.trim().is_empty() => {
            Err(ApiError::Validation(MISSING_FIELDS.into()))
        }
        Value::String(text) => parse_flexible_datetime(text, "timestamp")
            .map_err(|err| ApiError::Validation(err.to_string())),
        Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .and_then(|timestamp| ensure_storable(timestamp, "timestamp").ok())
            .ok_or_else(|| {
                ApiError::Validation(format!("timestamp is out of range: {number}"))
            }),
        Value::Null => Err(ApiError::Validation(MISSING_FIELDS.into())),
        other => Err(ApiError::Validation(format!(
            "timestamp must be a string or epoch milliseconds, got {other}"
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedReading {
    pub id: String,
    pub success: bool,
}

/// Query strings stay raw so that bad values map to a readable 400.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeParams {
    pub older_than_days: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResult {
    pub deleted: u64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date_param(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    non_empty(value)
        .map(|raw| {
            parse_flexible_datetime(&raw, field)
                .map_err(|err| ApiError::Validation(err.to_string()))
        })
        .transpose()
}

fn parse_count_param<T>(value: Option<String>, field: &str, default: T) -> Result<T, ApiError>
where
    T: std::str::FromStr,
{
    match non_empty(value) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            ApiError::Validation(format!(
                "{field} must be a non-negative integer, got '{raw}'"
            ))
        }),
        None => Ok(default),
    }
}

pub async fn create_reading(
    State(state): State<AppState>,
    payload: Result<Json<CreateReadingBody>, JsonRejection>,
) -> Result<Json<CreatedReading>, ApiError> {
    let Json(body) = payload?;
    let reading = body.into_new_reading()?;

    let id = state
        .db
        .insert_volume_reading(reading)
        .await
        .map_err(ApiError::internal("Failed to add volume reading"))?;

    Ok(Json(CreatedReading { id, success: true }))
}

pub async fn list_readings(
    State(state): State<AppState>,
    params: Result<Query<RangeParams>, QueryRejection>,
) -> Result<Json<VolumeHistoryData>, ApiError> {
    let Query(params) = params?;
    let start = parse_date_param(params.start_date, "startDate")?;
    let end = parse_date_param(params.end_date, "endDate")?;
    let limit = parse_count_param(params.limit, "limit", DEFAULT_HISTORY_LIMIT)?;

    let history = state
        .db
        .query_volume_history(start, end, limit)
        .await
        .map_err(ApiError::internal("Failed to fetch volume history"))?;

    Ok(Json(history))
}

pub async fn reading_stats(
    State(state): State<AppState>,
    params: Result<Query<RangeParams>, QueryRejection>,
) -> Result<Json<VolumeStats>, ApiError> {
    let Query(params) = params?;
    let start = parse_date_param(params.start_date, "startDate")?;
    let end = parse_date_param(params.end_date, "endDate")?;

    let stats = state
        .db
        .volume_stats(start, end)
        .await
        .map_err(ApiError::internal("Failed to fetch volume stats"))?;

    Ok(Json(stats))
}

pub async fn recent_readings(
    State(state): State<AppState>,
    params: Result<Query<RangeParams>, QueryRejection>,
) -> Result<Json<Vec<VolumeReading>>, ApiError> {
    let Query(params) = params?;
    let limit = parse_count_param(params.limit, "limit", DEFAULT_RECENT_LIMIT)?;

    let readings = state
        .db
        .recent_volume_readings(limit)
        .await
        .map_err(ApiError::internal("Failed to fetch recent readings"))?;

    Ok(Json(readings))
}

pub async fn purge_readings(
    State(state): State<AppState>,
    params: Result<Query<PurgeParams>, QueryRejection>,
) -> Result<Json<PurgeResult>, ApiError> {
    let Query(params) = params?;
    let days = parse_count_param(params.older_than_days, "olderThanDays", DEFAULT_RETENTION_DAYS)?;
    if days > MAX_RETENTION_DAYS {
        return Err(ApiError::Validation(format!(
            "olderThanDays must be at most {MAX_RETENTION_DAYS}"
        )));
    }

    let deleted = state
        .db
        .purge_volume_readings_older_than(days)
        .await
        .map_err(ApiError::internal("Failed to delete old readings"))?;

    Ok(Json(PurgeResult { deleted }))
}
