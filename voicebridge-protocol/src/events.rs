//! Wire frames exchanged between the relay and its clients

use serde::{Deserialize, Serialize};

use crate::action::AgentAction;
use crate::mode::ClientMode;

/// Wall-clock Unix time in seconds, as carried on wire frames.
///
/// Timestamps are observability-only; nothing orders or expires on them.
pub fn unix_time() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// One resolved utterance from the voice pipeline.
///
/// Created exactly once per utterance by the event source, immutable after
/// construction, and serialized independently to every connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEvent {
    /// Recognized utterance (required, may be empty)
    pub text: String,
    /// Structured agent action, if the agent produced one
    pub agent_response: Option<AgentAction>,
    /// Creation time, Unix seconds
    pub timestamp: f64,
    /// Recognition confidence, when the pipeline reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl VoiceEvent {
    pub fn new(text: impl Into<String>, agent_response: Option<AgentAction>) -> Self {
        Self {
            text: text.into(),
            agent_response,
            timestamp: unix_time(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Per-client entry in a `status_response` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub client_id: String,
    pub mode: ClientMode,
    /// Unix seconds at registration
    pub connected_at: f64,
    /// Seconds since registration
    pub connected_for: f64,
}

/// Frames sent from the relay to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Registration acknowledgement, sent before any event traffic
    #[serde(rename = "connected")]
    Connected {
        client_id: String,
        mode: ClientMode,
        server_time: f64,
    },

    /// A resolved utterance, fanned out to every registered client.
    /// `agent_response` is an explicit `null` when absent.
    #[serde(rename = "voice_result")]
    VoiceResult {
        text: String,
        agent_response: Option<AgentAction>,
        timestamp: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },

    /// Heartbeat reply; echoes the client's timestamp
    #[serde(rename = "pong")]
    Pong {
        timestamp: f64,
        server_timestamp: f64,
    },

    /// Acknowledges a `mode_change` request
    #[serde(rename = "mode_changed")]
    ModeChanged { new_mode: ClientMode, timestamp: f64 },

    /// Reply to a `status_request`
    #[serde(rename = "status_response")]
    StatusResponse {
        client_count: usize,
        clients: Vec<ClientSummary>,
        timestamp: f64,
    },

    /// Periodic liveness broadcast
    #[serde(rename = "status_update")]
    StatusUpdate {
        connected_clients: usize,
        timestamp: f64,
    },

    /// Request-level error (e.g. invalid requested mode); never terminal
    #[serde(rename = "error")]
    Error { message: String, timestamp: f64 },

    /// Catch-all so newer relays can add frame kinds without breaking us
    #[serde(other)]
    Unknown,
}

impl ServerFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<VoiceEvent> for ServerFrame {
    fn from(event: VoiceEvent) -> Self {
        ServerFrame::VoiceResult {
            text: event.text,
            agent_response: event.agent_response,
            timestamp: event.timestamp,
            confidence: event.confidence,
        }
    }
}

/// Frames sent from a client to the relay. None carry business payload;
/// the bridge is push-only for events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Liveness heartbeat
    #[serde(rename = "ping")]
    Ping { timestamp: f64 },

    /// Request a mode switch without reconnecting. The mode is a raw string
    /// so the relay can answer invalid values with an `error` frame.
    #[serde(rename = "mode_change")]
    ModeChange { mode: String },

    /// Ask for the relay's view of connected clients
    #[serde(rename = "status_request")]
    StatusRequest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Unrecognized client frame; logged and ignored by the relay
    #[serde(other)]
    Unknown,
}

impl ClientFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
