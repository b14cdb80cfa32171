use serde::{Deserialize, Serialize};

use super::error::ApiError;

pub const INVALID_ACTION: &str = "Invalid action. Use \"start\" or \"stop\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
}

/// `{action: "start" | "stop"}` body shared by every toggle endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ActionBody {
    pub action: Option<String>,
}

impl ActionBody {
    pub fn action(&self) -> Result<Action, ApiError> {
        match self.action.as_deref() {
            Some("start") => Ok(Action::Start),
            Some("stop") => Ok(Action::Stop),
            _ => Err(ApiError::Validation(INVALID_ACTION.into())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl ControlResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            pid: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            pid: None,
        }
    }
}
