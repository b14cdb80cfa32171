//! Logging macros that only fire when the calling module sets `ENABLE_LOGS`.
//!
//! The sampler, schedule and retention loops log on every tick, so each keeps
//! its own switch. Usage:
//! ```ignore
//! // At the top of the module:
//! const ENABLE_LOGS: bool = true;
//!
//! // The macros live at the crate root:
//! use crate::{log_error, log_info, log_warn};
//!
//! log_info!("Logged scheduled volume reading {}", id);
//! ```

/// Conditional info logging.
/// Reads the `ENABLE_LOGS` const of the module it expands in.
///
/// ```rust
/// const ENABLE_LOGS: bool = false; // silences the module
/// ```
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Conditional warn logging; same `ENABLE_LOGS` rule as `log_info!`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Conditional error logging; same `ENABLE_LOGS` rule as `log_info!`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
