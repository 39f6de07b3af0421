//! Client operation modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What a client does with a received voice result.
///
/// Held client-side: the relay records each client's mode for status
/// reporting but delivers every event to every client regardless of mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    /// Inject the recognized text as literal keystrokes
    Type,
    /// Execute only the structured agent action, ignore raw text
    Command,
    /// Typed text first, then the structured action if present
    Both,
}

impl ClientMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientMode::Type => "type",
            ClientMode::Command => "command",
            ClientMode::Both => "both",
        }
    }
}

impl Default for ClientMode {
    fn default() -> Self {
        ClientMode::Both
    }
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("invalid mode '{0}' (expected type, command, or both)")]
pub struct ModeParseError(pub String);

impl FromStr for ClientMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "type" => Ok(ClientMode::Type),
            "command" => Ok(ClientMode::Command),
            "both" => Ok(ClientMode::Both),
            other => Err(ModeParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip_strings() {
        for mode in [ClientMode::Type, ClientMode::Command, ClientMode::Both] {
            assert_eq!(mode.as_str().parse::<ClientMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_mode_parse_rejects_garbage() {
        assert!("keyboard".parse::<ClientMode>().is_err());
        assert!("".parse::<ClientMode>().is_err());
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        let json = serde_json::to_string(&ClientMode::Command).unwrap();
        assert_eq!(json, "\"command\"");
    }
}
