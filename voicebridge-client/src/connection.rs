//! Bridge connection lifecycle: dial, session loop, reconnect
//!
//! One session = one WebSocket connection to the relay. The client keeps a
//! heartbeat running, hands every `voice_result` to the [`Dispatcher`], and
//! reconnects with capped exponential backoff when the link drops.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use voicebridge_protocol::{unix_time, ClientFrame, ClientMode, ServerFrame};

/// How a session ended
enum SessionEnd {
    /// Local shutdown was requested
    Shutdown,
    /// The server closed the connection or the stream ended
    Closed,
}

/// Remote automation client for the voice-event bridge
pub struct BridgeClient {
    config: ClientConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown: watch::Sender<bool>,
    /// Outbound queue of the live session, if any
    session_tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl BridgeClient {
    pub fn new(config: ClientConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            dispatcher,
            shutdown,
            session_tx: Mutex::new(None),
        }
    }

    /// Connect and keep serving sessions until shutdown.
    ///
    /// Dial failures and dropped connections trigger reconnects with
    /// exponential backoff (reset after any successful session) unless
    /// `auto_reconnect` is off.
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let initial_delay = Duration::from_secs(self.config.reconnect_delay_secs.max(1));
        let max_delay = Duration::from_secs(
            self.config
                .max_reconnect_delay_secs
                .max(self.config.reconnect_delay_secs),
        );
        let mut delay = initial_delay;

        loop {
            match self.run_session(&mut shutdown_rx).await {
                Ok(SessionEnd::Shutdown) => {
                    info!("👋 Disconnected");
                    return Ok(());
                }
                Ok(SessionEnd::Closed) => {
                    delay = initial_delay;
                    if !self.config.auto_reconnect {
                        info!("Connection closed, auto-reconnect disabled");
                        return Ok(());
                    }
                    warn!("Connection closed, reconnecting in {:?}", delay);
                }
                Err(e) => {
                    if !self.config.auto_reconnect {
                        return Err(e);
                    }
                    warn!("Connection failed: {}, retrying in {:?}", e, delay);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.changed() => {
                    info!("👋 Disconnected");
                    return Ok(());
                }
            }
            delay = (delay * 2).min(max_delay);
        }
    }

    /// Request shutdown; `run` returns after the current session winds down.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Switch mode. With a live session the server is asked and the local
    /// mode follows its `mode_changed` ack; otherwise the switch is local.
    pub async fn change_mode(&self, mode: ClientMode) -> Result<()> {
        let guard = self.session_tx.lock().await;
        match guard.as_ref() {
            Some(tx) => {
                let frame = ClientFrame::ModeChange {
                    mode: mode.to_string(),
                };
                if tx.send(frame.to_json()?).await.is_err() {
                    // Session just died; apply locally
                    self.dispatcher.set_mode(mode).await;
                }
            }
            None => self.dispatcher.set_mode(mode).await,
        }
        Ok(())
    }

    async fn run_session(&self, shutdown_rx: &mut watch::Receiver<bool>) -> Result<SessionEnd> {
        let mode = self.dispatcher.mode().await;
        let url = format!("{}?mode={}", self.config.server_url, mode);
        info!("🔌 Connecting to {}", self.config.server_url);

        let (ws, _) = connect_async(&url).await?;
        let (mut ws_sender, mut ws_receiver) = ws.split();

        let (tx, mut rx) = mpsc::channel::<String>(64);
        *self.session_tx.lock().await = Some(tx.clone());

        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let mut ping = tokio::time::interval(Duration::from_secs(
            self.config.ping_interval_secs.max(1),
        ));
        ping.tick().await; // first tick is immediate

        let end = loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break SessionEnd::Shutdown,
                _ = ping.tick() => {
                    let frame = ClientFrame::Ping { timestamp: unix_time() };
                    match frame.to_json() {
                        Ok(json) => {
                            if tx.send(json).await.is_err() {
                                break SessionEnd::Closed;
                            }
                        }
                        Err(e) => warn!("Failed to encode ping: {}", e),
                    }
                }
                msg = ws_receiver.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        self.handle_server_frame(text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break SessionEnd::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break SessionEnd::Closed;
                    }
                },
            }
        };

        *self.session_tx.lock().await = None;
        drop(tx);
        let _ = writer.await;
        Ok(end)
    }

    async fn handle_server_frame(&self, text: &str) {
        let frame: ServerFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Unparseable server frame: {}", e);
                return;
            }
        };

        match frame {
            ServerFrame::Connected {
                client_id, mode, ..
            } => {
                info!("✅ Registered as {} (mode: {})", client_id, mode);
                self.dispatcher.set_mode(mode).await;
            }
            ServerFrame::VoiceResult {
                text,
                agent_response,
                ..
            } => {
                debug!("🎙️ voice_result: \"{}\"", text);
                self.dispatcher
                    .handle_voice_result(&text, agent_response.as_ref())
                    .await;
            }
            ServerFrame::Pong { timestamp, .. } => {
                debug!("Pong (rtt ~{:.0}ms)", (unix_time() - timestamp) * 1000.0);
            }
            ServerFrame::ModeChanged { new_mode, .. } => {
                self.dispatcher.set_mode(new_mode).await;
            }
            ServerFrame::StatusResponse { client_count, .. } => {
                debug!("Server reports {} connected client(s)", client_count);
            }
            ServerFrame::StatusUpdate {
                connected_clients, ..
            } => {
                debug!("Server reports {} connected client(s)", connected_clients);
            }
            ServerFrame::Error { message, .. } => {
                warn!("Server error: {}", message);
            }
            ServerFrame::Unknown => {
                debug!("Ignoring unrecognized server frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::InputBackend;
    use std::collections::HashMap;
    use voicebridge_protocol::MouseButton;

    struct NullBackend;

    impl InputBackend for NullBackend {
        fn type_text(&self, _text: &str) -> crate::error::Result<()> {
            Ok(())
        }
        fn click(&self, _x: i32, _y: i32, _button: MouseButton) -> crate::error::Result<()> {
            Ok(())
        }
        fn move_pointer(&self, _x: i32, _y: i32) -> crate::error::Result<()> {
            Ok(())
        }
        fn press_key(&self, _combo: &str) -> crate::error::Result<()> {
            Ok(())
        }
        fn run_command(&self, _command_line: &str) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn client(config: ClientConfig) -> BridgeClient {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(NullBackend),
            config.mode,
            config.max_text_len,
            HashMap::new(),
        ));
        BridgeClient::new(config, dispatcher)
    }

    #[tokio::test]
    async fn test_run_gives_up_without_auto_reconnect() {
        let config = ClientConfig {
            server_url: "ws://127.0.0.1:1/bridge".to_string(),
            auto_reconnect: false,
            ..ClientConfig::default()
        };
        // Nothing listens on port 1; the dial error must surface
        assert!(client(config).run().await.is_err());
    }

    #[tokio::test]
    async fn test_stop_interrupts_reconnect_wait() {
        let config = ClientConfig {
            server_url: "ws://127.0.0.1:1/bridge".to_string(),
            auto_reconnect: true,
            reconnect_delay_secs: 3600,
            ..ClientConfig::default()
        };
        let client = Arc::new(client(config));

        let runner = {
            let client = client.clone();
            tokio::spawn(async move { client.run().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.stop();

        let result = tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("run should return promptly after stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_change_mode_without_session_applies_locally() {
        let client = client(ClientConfig::default());
        client.change_mode(ClientMode::Command).await.unwrap();
        assert_eq!(client.dispatcher.mode().await, ClientMode::Command);
    }
}
