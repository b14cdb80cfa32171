//! Volume reading data models.
//!
//! A reading is one timestamped observation of the processed (`volume`) and
//! raw (`ambient`) noise level. Readings are immutable once stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location tag applied by the sampler when none is configured.
pub const DEFAULT_LOCATION: &str = "default";

/// A persisted reading as returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeReading {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub volume: f64,
    pub ambient: f64,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A reading awaiting insertion. The store allocates the id and fills in the
/// timestamp when the caller leaves it empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewVolumeReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub volume: f64,
    pub ambient: f64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl NewVolumeReading {
    pub fn into_reading(self, id: String, inserted_at: DateTime<Utc>) -> VolumeReading {
        VolumeReading {
            id,
            timestamp: self.timestamp.unwrap_or(inserted_at),
            volume: self.volume,
            ambient: self.ambient,
            is_active: self.is_active,
            noise_type: self.noise_type,
            location: self.location,
        }
    }
}
