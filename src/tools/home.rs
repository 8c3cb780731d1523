//! Smart-home device switching.

use super::types::{Tool, ToolError, required};
use crate::collaborators::HomeState;
use crate::directive::Action;
use async_trait::async_trait;
use std::sync::Arc;

const USAGE: &str = "device-control --device NAME --state on|off";

/// Parse an on/off state word.
fn parse_state(state: &str) -> Option<bool> {
    match state.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "open" | "start" => Some(true),
        "off" | "false" | "0" | "close" | "stop" => Some(false),
        _ => None,
    }
}

/// `device-control`: switch a named device through the home collaborator.
pub struct DeviceControlTool {
    home: Option<Arc<dyn HomeState>>,
}

impl DeviceControlTool {
    /// Create the tool. Without a home collaborator every call fails.
    pub fn new(home: Option<Arc<dyn HomeState>>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Tool for DeviceControlTool {
    fn name(&self) -> &str {
        "device-control"
    }

    fn usage(&self) -> &str {
        USAGE
    }

    async fn execute(&self, action: &Action) -> Result<String, ToolError> {
        let device = required(action, "device", USAGE)?;
        let state = required(action, "state", USAGE)?;
        let on = parse_state(state).ok_or_else(|| ToolError::InvalidArgument {
            arg: "state",
            message: format!("expected on or off, got '{state}'"),
        })?;
        let home = self.home.as_ref().ok_or(ToolError::Unavailable("home control"))?;
        Ok(home.set_device(device, on).await?)
    }
}
