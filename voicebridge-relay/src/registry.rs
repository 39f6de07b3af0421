//! Client registry: the authoritative set of connected clients
//!
//! The registry owns membership and nothing else. The broadcast relay only
//! ever iterates over a [`ClientRegistry::snapshot`], so membership changes
//! during a broadcast never corrupt delivery to the remaining clients.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::error::{RelayError, Result};
use voicebridge_protocol::{unix_time, ClientMode, ClientSummary};

/// Bound on each client's outbound frame queue. A client that falls this far
/// behind is a slow consumer and gets dropped by the per-send timeout.
pub const OUTBOUND_QUEUE_FRAMES: usize = 256;

/// Handle to one accepted client connection.
///
/// Cloning is cheap; all clones feed the same per-connection writer task,
/// which drains the queue into the WebSocket sequentially, so frames reach
/// a given client in the order they were queued.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: Uuid,
    mode: ClientMode,
    connected_at: f64,
    sender: mpsc::Sender<String>,
}

impl ClientHandle {
    /// Create a handle and the receiving end of its outbound queue.
    pub fn new(mode: ClientMode) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(OUTBOUND_QUEUE_FRAMES);
        let handle = Self {
            id: Uuid::new_v4(),
            mode,
            connected_at: unix_time(),
            sender,
        };
        (handle, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> ClientMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queue a serialized frame for this client, bounded by `timeout`.
    ///
    /// A timeout means the client is not reading fast enough; a closed
    /// channel means its writer task is gone. Both are terminal for the
    /// client and the caller is expected to unregister it.
    pub async fn send(&self, frame: String, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.sender.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(RelayError::ChannelClosed),
            Err(_) => Err(RelayError::SendTimeout),
        }
    }

    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            client_id: self.id.to_string(),
            mode: self.mode,
            connected_at: self.connected_at,
            connected_for: unix_time() - self.connected_at,
        }
    }
}

/// Thread-safe membership set, insertion-ordered.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<Mutex<Vec<ClientHandle>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a client to the active set, making it eligible for all subsequent
    /// broadcasts. Fails only if the connection is already dead.
    pub async fn register(&self, handle: ClientHandle) -> Result<()> {
        if handle.is_closed() {
            return Err(RelayError::ConnectionAlreadyClosed);
        }
        let mut clients = self.clients.lock().await;
        clients.push(handle);
        tracing::info!("client registered. total clients: {}", clients.len());
        Ok(())
    }

    /// Idempotent removal; unknown ids are a no-op.
    pub async fn unregister(&self, id: Uuid) {
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|c| c.id != id);
        if clients.len() < before {
            tracing::info!("client {} unregistered. remaining: {}", id, clients.len());
        }
    }

    /// Point-in-time copy of the active set, in insertion order.
    ///
    /// The lock is held only for the copy, so registration and removal are
    /// never blocked by an in-progress broadcast.
    pub async fn snapshot(&self) -> Vec<ClientHandle> {
        self.clients.lock().await.clone()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Update the recorded mode for a client. Returns false if the client is
    /// no longer registered.
    pub async fn set_mode(&self, id: Uuid, mode: ClientMode) -> bool {
        let mut clients = self.clients.lock().await;
        match clients.iter_mut().find(|c| c.id == id) {
            Some(client) => {
                client.mode = mode;
                true
            }
            None => false,
        }
    }

    /// Per-client summaries for status frames.
    pub async fn client_info(&self) -> Vec<ClientSummary> {
        self.clients.lock().await.iter().map(|c| c.summary()).collect()
    }

    /// Remove every client, dropping their queue senders. Each writer task
    /// finishes its queued frames and then closes its socket.
    pub async fn drain(&self) {
        let mut clients = self.clients.lock().await;
        let n = clients.len();
        clients.clear();
        if n > 0 {
            tracing::info!("registry drained, {} client(s) disconnected", n);
        }
    }
}
