use serde::{Deserialize, Serialize};

/// Coarse label derived from a volume value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NoiseType {
    Quiet,
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl NoiseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseType::Quiet => "Quiet",
            NoiseType::Low => "Low",
            NoiseType::Medium => "Medium",
            NoiseType::High => "High",
            NoiseType::VeryHigh => "Very High",
        }
    }

    /// Buckets are `[.., 30)`, `[30, 50)`, `[50, 70)`, `[70, 90)`, `[90, ..]`.
    /// NaN fails every comparison and lands in `VeryHigh`.
    pub fn classify(volume: f64) -> Self {
        if volume < 30.0 {
            NoiseType::Quiet
        } else if volume < 50.0 {
            NoiseType::Low
        } else if volume < 70.0 {
            NoiseType::Medium
        } else if volume < 90.0 {
            NoiseType::High
        } else {
            NoiseType::VeryHigh
        }
    }
}

/// The values currently shown on the dashboard. The sampler's cadence check
/// reads whatever was written last.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentLevels {
    pub volume: f64,
    pub ambient: f64,
    pub is_active: bool,
}

impl CurrentLevels {
    pub fn noise_type(&self) -> NoiseType {
        NoiseType::classify(self.volume)
    }
}
