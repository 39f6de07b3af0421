//! Shared wire types for the VoiceBridge relay and clients
//!
//! The bridge speaks newline-free JSON text frames over a WebSocket. Every
//! frame is tagged by a `type` field; structured agent actions are tagged by
//! an `action` field. Both sides tolerate tags they do not recognize, so new
//! frame and action kinds can be added server-side without breaking older
//! clients.
//!
//! # Frame directions
//!
//! Server → client: `connected`, `voice_result`, `pong`, `mode_changed`,
//! `status_response`, `status_update`, `error`
//!
//! Client → server: `ping`, `mode_change`, `status_request`

pub mod action;
pub mod events;
pub mod mode;

// Re-exports
pub use action::{AgentAction, MouseButton};
pub use events::{unix_time, ClientFrame, ClientSummary, ServerFrame, VoiceEvent};
pub use mode::{ClientMode, ModeParseError};
