pub mod controller;
pub mod error;

pub use controller::{ProcessCommand, ProcessController, ProcessState, ProcessStatus};
pub use error::ProcessError;
