//! Aggregate statistics over a set of readings. Derived on demand, never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::VolumeReading;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStats {
    pub avg_volume: f64,
    pub max_volume: f64,
    pub min_volume: f64,
    pub total_readings: u64,
    pub time_range: TimeRange,
}

/// Readings page plus the stats computed over exactly that page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeHistoryData {
    pub readings: Vec<VolumeReading>,
    pub stats: VolumeStats,
}

impl VolumeStats {
    /// Degenerate stats for an empty set: zeros, both bounds at `now`.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            avg_volume: 0.0,
            max_volume: 0.0,
            min_volume: 0.0,
            total_readings: 0,
            time_range: TimeRange { start: now, end: now },
        }
    }

    pub fn from_readings(readings: &[VolumeReading], now: DateTime<Utc>) -> Self {
        let Some(first) = readings.first() else {
            return Self::empty(now);
        };

        let mut sum = 0.0;
        let mut max_volume = first.volume;
        let mut min_volume = first.volume;
        let mut start = first.timestamp;
        let mut end = first.timestamp;

        for reading in readings {
            sum += reading.volume;
            max_volume = max_volume.max(reading.volume);
            min_volume = min_volume.min(reading.volume);
            start = start.min(reading.timestamp);
            end = end.max(reading.timestamp);
        }

        Self {
            avg_volume: round_half_up(sum / readings.len() as f64),
            max_volume,
            min_volume,
            total_readings: readings.len() as u64,
            time_range: TimeRange { start, end },
        }
    }
}

/// Rounds to the nearest integer with halves going up (`2.5 -> 3`, `-2.5 -> -2`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
