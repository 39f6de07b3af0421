//! Structured agent actions carried inside a voice result

use serde::{Deserialize, Serialize};

/// Mouse button for click actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl Default for MouseButton {
    fn default() -> Self {
        MouseButton::Left
    }
}

/// Discriminated agent action, tagged by the `action` field.
///
/// Action kinds the client does not recognize deserialize as
/// [`AgentAction::Unknown`] rather than failing, so a newer relay can emit
/// new kinds without disconnecting older clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AgentAction {
    /// Inject `content` as literal keystrokes
    Type { content: String },

    /// Synthesize a pointer click at screen coordinates
    Click {
        x: i32,
        y: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        button: Option<MouseButton>,
    },

    /// Move the pointer to screen coordinates without clicking
    Move { x: i32, y: i32 },

    /// Press a named key or key combination (e.g. "Return", "ctrl+s")
    Key { key: String },

    /// Run a named local action configured on the client
    Execute { command: String },

    /// Catch-all for action kinds this build does not know about
    #[serde(other)]
    Unknown,
}

impl AgentAction {
    /// Short name of the discriminant, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            AgentAction::Type { .. } => "type",
            AgentAction::Click { .. } => "click",
            AgentAction::Move { .. } => "move",
            AgentAction::Key { .. } => "key",
            AgentAction::Execute { .. } => "execute",
            AgentAction::Unknown => "unknown",
        }
    }
}
