pub mod clock;
pub mod controller;
pub mod sink;
pub mod state;

pub use clock::{Clock, SystemClock};
pub use controller::VolumeSampler;
pub use sink::{HttpReadingSink, ReadingSink};
pub use state::{CurrentLevels, NoiseType};
