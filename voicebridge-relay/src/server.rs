//! WebSocket server: accepts client connections and wires them into the
//! registry
//!
//! Each accepted connection gets two tasks: a writer that drains the
//! client's bounded outbound queue into the socket (the single sequential
//! writer that guarantees per-client ordering), and a reader that handles
//! the few client→server frames (heartbeat, mode changes, status requests)
//! and detects close. The bridge is push-only for events.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::registry::{ClientHandle, ClientRegistry};
use crate::relay::BridgeRelay;
use voicebridge_protocol::{unix_time, ClientFrame, ClientMode, ServerFrame};

/// WebSocket bridge server.
pub struct BridgeServer {
    config: RelayConfig,
    registry: ClientRegistry,
    relay: Arc<BridgeRelay>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    status_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    running: RwLock<bool>,
}

impl BridgeServer {
    pub fn new(config: RelayConfig) -> Self {
        let registry = ClientRegistry::new();
        let relay = Arc::new(BridgeRelay::new(
            registry.clone(),
            Duration::from_secs(config.send_timeout_secs),
        ));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            registry,
            relay,
            accept_task: Mutex::new(None),
            status_task: Mutex::new(None),
            shutdown,
            running: RwLock::new(false),
        }
    }

    /// The publish entry point for the event source.
    pub fn relay(&self) -> Arc<BridgeRelay> {
        Arc::clone(&self.relay)
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub async fn client_count(&self) -> usize {
        self.registry.client_count().await
    }

    /// Bind and start accepting clients. Returns the bound address so tests
    /// can listen on port 0.
    pub async fn start(&self) -> Result<SocketAddr> {
        if *self.running.read().await {
            return Err(RelayError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        let addr = listener.local_addr()?;

        self.shutdown.send_replace(false);
        *self.running.write().await = true;

        // Accept loop
        let registry = self.registry.clone();
        let endpoint_path = self.config.endpoint_path.clone();
        let send_timeout = Duration::from_secs(self.config.send_timeout_secs);
        let mut shutdown_rx = self.shutdown.subscribe();

        let accept = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            tokio::spawn(handle_connection(
                                stream,
                                peer,
                                registry.clone(),
                                endpoint_path.clone(),
                                send_timeout,
                                shutdown_rx.clone(),
                            ));
                        }
                        Err(e) => tracing::error!("failed to accept connection: {}", e),
                    }
                }
            }
            tracing::info!("accept loop stopped");
        });
        *self.accept_task.lock().await = Some(accept);

        // Periodic status updates, only when someone is listening
        let relay = Arc::clone(&self.relay);
        let mut shutdown_rx = self.shutdown.subscribe();
        let status_interval = Duration::from_secs(self.config.status_interval_secs);

        let status = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(status_interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let connected = relay.client_count().await;
                        if connected > 0 {
                            relay.broadcast_frame(&ServerFrame::StatusUpdate {
                                connected_clients: connected,
                                timestamp: unix_time(),
                            }).await;
                        }
                    }
                }
            }
        });
        *self.status_task.lock().await = Some(status);

        tracing::info!(
            "bridge server listening on {} (clients connect to ws://{}{})",
            addr,
            addr,
            self.config.endpoint_path
        );
        Ok(addr)
    }

    /// Stop accepting, close every registered connection, and let in-flight
    /// fan-outs finish (their snapshots keep the queue senders alive until
    /// the last send completes).
    pub async fn stop(&self) -> Result<()> {
        if !*self.running.read().await {
            return Err(RelayError::NotStarted);
        }
        *self.running.write().await = false;

        let _ = self.shutdown.send(true);

        if let Some(task) = self.accept_task.lock().await.take() {
            task.abort();
        }
        if let Some(task) = self.status_task.lock().await.take() {
            task.abort();
        }

        self.registry.drain().await;
        tracing::info!("bridge server stopped");
        Ok(())
    }
}

/// Extract a requested mode from the connection query string, defaulting to
/// `both` on absence or invalid values (logged, never rejected).
fn mode_from_query(query: Option<&str>) -> ClientMode {
    let Some(query) = query else {
        return ClientMode::default();
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("mode=") {
            return match value.parse() {
                Ok(mode) => mode,
                Err(_) => {
                    tracing::warn!("invalid mode '{}', defaulting to 'both'", value);
                    ClientMode::default()
                }
            };
        }
    }
    ClientMode::default()
}

/// Serialize and queue a frame for one client. Queue failures are logged;
/// the terminal failure, if any, surfaces on the reader loop.
async fn send_frame(client: &ClientHandle, frame: &ServerFrame, timeout: Duration) {
    match frame.to_json() {
        Ok(json) => {
            if let Err(e) = client.send(json, timeout).await {
                tracing::warn!("failed to queue frame for client {}: {}", client.id(), e);
            }
        }
        Err(e) => tracing::error!("failed to serialize frame: {}", e),
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: ClientRegistry,
    endpoint_path: String,
    send_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut requested_mode = ClientMode::default();
    let callback = |req: &Request, response: Response| {
        if req.uri().path() != endpoint_path {
            tracing::warn!(
                "rejecting connection from {} to invalid path '{}'",
                peer,
                req.uri().path()
            );
            let mut resp = ErrorResponse::new(Some("invalid path".to_string()));
            *resp.status_mut() = StatusCode::NOT_FOUND;
            return Err(resp);
        }
        requested_mode = mode_from_query(req.uri().query());
        Ok(response)
    };

    let ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!("websocket handshake with {} failed: {}", peer, e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws.split();
    let (handle, mut rx) = ClientHandle::new(requested_mode);
    let client_id = handle.id();

    // The registration ack must precede any event traffic. Queueing it
    // before the handle reaches the registry guarantees the writer emits it
    // first, whatever publish calls race with registration.
    let connected = ServerFrame::Connected {
        client_id: client_id.to_string(),
        mode: requested_mode,
        server_time: unix_time(),
    };
    send_frame(&handle, &connected, send_timeout).await;

    if let Err(e) = registry.register(handle.clone()).await {
        tracing::warn!("discarding connection from {}: {}", peer, e);
        return;
    }
    tracing::info!(
        "client {} connected from {} with mode '{}'",
        client_id,
        peer,
        requested_mode
    );

    // Single sequential writer for this connection
    let writer = tokio::spawn(async move {
        while let Some(json) = rx.recv().await {
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_client_frame(text.as_str(), &handle, &registry, send_timeout).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ws-level ping/pong/binary carry no payload
                Some(Err(e)) => {
                    tracing::debug!("client {} transport error: {}", client_id, e);
                    break;
                }
            }
        }
    }

    registry.unregister(client_id).await;
    tracing::info!("client {} disconnected", client_id);

    // Dropping the last queue sender lets the writer flush and close the
    // socket. In-flight snapshots may hold clones briefly; the writer ends
    // once they finish.
    drop(handle);
    let _ = writer.await;
}

async fn handle_client_frame(
    text: &str,
    client: &ClientHandle,
    registry: &ClientRegistry,
    send_timeout: Duration,
) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("invalid JSON from client {}: {}", client.id(), e);
            return;
        }
    };

    match frame {
        ClientFrame::Ping { timestamp } => {
            send_frame(
                client,
                &ServerFrame::Pong {
                    timestamp,
                    server_timestamp: unix_time(),
                },
                send_timeout,
            )
            .await;
        }
        ClientFrame::ModeChange { mode } => match mode.parse::<ClientMode>() {
            Ok(new_mode) => {
                if registry.set_mode(client.id(), new_mode).await {
                    tracing::info!("client {} changed mode to '{}'", client.id(), new_mode);
                    send_frame(
                        client,
                        &ServerFrame::ModeChanged {
                            new_mode,
                            timestamp: unix_time(),
                        },
                        send_timeout,
                    )
                    .await;
                }
            }
            Err(_) => {
                send_frame(
                    client,
                    &ServerFrame::Error {
                        message: format!("Invalid mode: {}", mode),
                        timestamp: unix_time(),
                    },
                    send_timeout,
                )
                .await;
            }
        },
        ClientFrame::StatusRequest { .. } => {
            let clients = registry.client_info().await;
            send_frame(
                client,
                &ServerFrame::StatusResponse {
                    client_count: clients.len(),
                    clients,
                    timestamp: unix_time(),
                },
                send_timeout,
            )
            .await;
        }
        ClientFrame::Unknown => {
            tracing::warn!("unknown frame type from client {}", client.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_query() {
        assert_eq!(mode_from_query(None), ClientMode::Both);
        assert_eq!(mode_from_query(Some("mode=type")), ClientMode::Type);
        assert_eq!(
            mode_from_query(Some("foo=bar&mode=command")),
            ClientMode::Command
        );
        // invalid values fall back rather than reject
        assert_eq!(mode_from_query(Some("mode=keyboard")), ClientMode::Both);
        assert_eq!(mode_from_query(Some("foo=bar")), ClientMode::Both);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut config = RelayConfig::default();
        config.listen_addr = "127.0.0.1:0".to_string();
        let server = BridgeServer::new(config);

        server.start().await.unwrap();
        assert!(matches!(
            server.start().await,
            Err(RelayError::AlreadyRunning)
        ));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start_fails() {
        let mut config = RelayConfig::default();
        config.listen_addr = "127.0.0.1:0".to_string();
        let server = BridgeServer::new(config);
        assert!(matches!(server.stop().await, Err(RelayError::NotStarted)));
    }
}
