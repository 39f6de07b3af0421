//! Remote automation client for the voice-event bridge
//!
//! Connects to a relay over WebSocket, receives `voice_result` frames, and
//! turns them into local input: typed text, clicks, key presses, and
//! configured commands. The connection self-heals with capped exponential
//! backoff; injection failures never tear it down.
//!
//! # Components
//!
//! - [`InputBackend`] — seam between dispatch logic and the desktop; the
//!   real implementation is [`DesktopInjector`] (xdotool / wtype / ydotool)
//! - [`Dispatcher`] — applies the client mode and safety limits to each
//!   incoming event
//! - [`BridgeClient`] — session loop, heartbeat, reconnect

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod inject;

// Re-exports
pub use config::ClientConfig;
pub use connection::BridgeClient;
pub use dispatch::Dispatcher;
pub use error::{ClientError, Result};
pub use inject::{DesktopInjector, DisplayServer, InputBackend};
