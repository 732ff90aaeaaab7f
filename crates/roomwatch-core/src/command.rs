//! Outbound device command.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque text token understood by the device firmware (e.g. `LED_ON`).
///
/// Commands are fire-and-forget. The only validation is that the token is
/// non-empty and fits on a single line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Command(String);

impl Command {
    pub const LED_ON: &'static str = "LED_ON";
    pub const LED_OFF: &'static str = "LED_OFF";

    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidCommand("command is empty".to_string()));
        }
        if trimmed.contains(['\n', '\r']) {
            return Err(CoreError::InvalidCommand(
                "command must be a single line".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn led_on() -> Self {
        Self(Self::LED_ON.to_string())
    }

    pub fn led_off() -> Self {
        Self(Self::LED_OFF.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Command {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        command.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
