//! Broadcast relay: fans each voice event out to every registered client
//!
//! Delivery is fire-and-forget, at-most-once per client per event. There is
//! no acknowledgement, no retry, and no backlog replay on reconnect; a
//! client that is offline when an event fires never receives it.

use std::time::Duration;

use crate::registry::ClientRegistry;
use voicebridge_protocol::{ServerFrame, VoiceEvent};

/// Default bound on each per-client send during a broadcast.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(3);

/// The single broadcast point for voice events.
///
/// The registry is injected rather than ambient, so tests can run several
/// independent relays in-process against fake client sets.
pub struct BridgeRelay {
    registry: ClientRegistry,
    send_timeout: Duration,
}

impl BridgeRelay {
    pub fn new(registry: ClientRegistry, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub async fn client_count(&self) -> usize {
        self.registry.client_count().await
    }

    /// Deliver `event` to every currently registered client.
    ///
    /// Each client's delivery is independent: a failure (closed connection
    /// or slow-consumer timeout) unregisters that client and moves on to the
    /// next. Nothing is ever raised to the event source; failures surface
    /// only in the logs.
    pub async fn publish(&self, event: VoiceEvent) {
        let preview = preview(&event.text);
        let frame = ServerFrame::from(event);
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("failed to serialize voice event: {}", e);
                return;
            }
        };

        let delivered = self.fan_out(json).await;
        tracing::info!("voice result delivered to {} client(s): '{}'", delivered, preview);
    }

    /// Broadcast a non-event frame (status updates) with the same
    /// failure-isolation semantics as [`publish`](Self::publish).
    pub async fn broadcast_frame(&self, frame: &ServerFrame) {
        match frame.to_json() {
            Ok(json) => {
                self.fan_out(json).await;
            }
            Err(e) => tracing::error!("failed to serialize broadcast frame: {}", e),
        }
    }

    async fn fan_out(&self, json: String) -> usize {
        let snapshot = self.registry.snapshot().await;
        if snapshot.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        for client in snapshot {
            match client.send(json.clone(), self.send_timeout).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!("dropping client {} after failed send: {}", client.id(), e);
                    self.registry.unregister(client.id()).await;
                }
            }
        }
        delivered
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > 50 {
        format!("{}...", text.chars().take(50).collect::<String>())
    } else {
        text.to_string()
    }
}
