pub mod volume_reading;
pub mod volume_stats;

pub use volume_reading::{NewVolumeReading, VolumeReading, DEFAULT_LOCATION};
pub use volume_stats::{round_half_up, TimeRange, VolumeHistoryData, VolumeStats};
