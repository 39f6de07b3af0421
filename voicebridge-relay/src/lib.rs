//! Voice-event bridge relay
//!
//! Receives finalized voice-recognition events from a voice pipeline and
//! fans them out to every connected remote automation client over
//! WebSocket. Delivery is best-effort, at-most-once per client per event:
//! there is no acknowledgement protocol, no durable queue, and no backlog
//! replay — a client that is offline when an event fires never sees it.
//! This is a deliberate trade-off for live-interaction relay, not
//! audit-grade messaging.
//!
//! # Components
//!
//! - [`ClientRegistry`] — authoritative membership set, injected into the
//!   relay (never ambient global state)
//! - [`BridgeRelay`] — the broadcast point; `publish` isolates per-client
//!   failures and never raises to the event source
//! - [`BridgeServer`] — WebSocket accept loop at `/bridge`, per-connection
//!   writer/reader tasks, heartbeat and status frames
//! - [`IngestServer`] — Unix socket NDJSON intake for the event source
//!
//! # Example
//!
//! ```no_run
//! use voicebridge_relay::{BridgeServer, RelayConfig};
//! use voicebridge_protocol::VoiceEvent;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = BridgeServer::new(RelayConfig::default());
//!     server.start().await?;
//!
//!     // The event source calls publish; client health is not its problem.
//!     let relay = server.relay();
//!     relay.publish(VoiceEvent::new("hello world", None)).await;
//!
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod registry;
pub mod relay;
pub mod server;

// Re-exports
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use ingest::IngestServer;
pub use registry::{ClientHandle, ClientRegistry};
pub use relay::BridgeRelay;
pub use server::BridgeServer;
