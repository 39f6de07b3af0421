//! Unix socket intake for the event source
//!
//! The voice pipeline (an external collaborator) delivers resolved
//! utterances as newline-delimited JSON over a local socket; each valid
//! line becomes one `publish` call. The pipeline never learns how many
//! clients exist or whether any delivery succeeded.
//!
//! Library users embedding the relay can skip this and call
//! [`BridgeRelay::publish`] directly.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::error::Result;
use crate::relay::BridgeRelay;
use voicebridge_protocol::{AgentAction, VoiceEvent};

/// One line of intake: the utterance and whatever the agent attached.
/// Timestamps are assigned here, at event creation.
#[derive(Debug, Deserialize)]
struct IngestLine {
    text: String,
    #[serde(default)]
    agent_response: Option<AgentAction>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// NDJSON event intake over a Unix socket
pub struct IngestServer {
    listener: UnixListener,
    socket_path: PathBuf,
    relay: Arc<BridgeRelay>,
}

impl IngestServer {
    /// Bind the intake socket, replacing any stale socket file
    pub fn bind(socket_path: impl AsRef<Path>, relay: Arc<BridgeRelay>) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();

        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path)?;

        // Owner-only access: whoever writes here drives keystrokes on every
        // connected client
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))?;

        tracing::info!("event ingest listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path,
            relay,
        })
    }

    /// Accept event-source connections until the task is dropped
    pub async fn run(&self) -> Result<()> {
        loop {
            let (stream, _addr) = self.listener.accept().await?;
            tracing::debug!("event source connected");
            let relay = Arc::clone(&self.relay);
            tokio::spawn(async move {
                handle_source(stream, relay).await;
            });
        }
    }
}

impl Drop for IngestServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

async fn handle_source(stream: UnixStream, relay: Arc<BridgeRelay>) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<IngestLine>(line) {
                    Ok(ingest) => {
                        let mut event = VoiceEvent::new(ingest.text, ingest.agent_response);
                        if let Some(confidence) = ingest.confidence {
                            event = event.with_confidence(confidence);
                        }
                        relay.publish(event).await;
                    }
                    Err(e) => tracing::warn!("skipping malformed ingest line: {}", e),
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("event source read error: {}", e);
                break;
            }
        }
    }
    tracing::debug!("event source disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ClientHandle, ClientRegistry};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use voicebridge_protocol::ClientMode;

    #[tokio::test]
    async fn test_ingest_line_publishes_to_clients() {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket_path = temp_dir.path().join("ingest.sock");

        let registry = ClientRegistry::new();
        let relay = Arc::new(BridgeRelay::new(registry.clone(), Duration::from_secs(1)));
        let (handle, mut rx) = ClientHandle::new(ClientMode::Both);
        registry.register(handle).await.unwrap();

        let ingest = IngestServer::bind(&socket_path, Arc::clone(&relay)).unwrap();
        let ingest_task = tokio::spawn(async move { ingest.run().await });

        let mut source = UnixStream::connect(&socket_path).await.unwrap();
        source
            .write_all(b"not json at all\n{\"text\":\"hello world\",\"confidence\":0.9}\n")
            .await
            .unwrap();
        source.flush().await.unwrap();

        // The malformed line is skipped; the valid one arrives
        let json = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(json.contains("\"type\":\"voice_result\""));
        assert!(json.contains("\"text\":\"hello world\""));
        assert!(json.contains("\"confidence\":0.9"));

        ingest_task.abort();
    }

    #[tokio::test]
    async fn test_bind_restricts_socket_to_owner() {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket_path = temp_dir.path().join("ingest.sock");

        let relay = Arc::new(BridgeRelay::new(
            ClientRegistry::new(),
            Duration::from_secs(1),
        ));
        let _ingest = IngestServer::bind(&socket_path, relay).unwrap();

        let mode = std::fs::metadata(&socket_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket_path = temp_dir.path().join("stale.sock");
        std::fs::write(&socket_path, b"").unwrap();

        let relay = Arc::new(BridgeRelay::new(
            ClientRegistry::new(),
            Duration::from_secs(1),
        ));
        let ingest = IngestServer::bind(&socket_path, relay).unwrap();
        assert!(socket_path.exists());
        drop(ingest);
        assert!(!socket_path.exists());
    }
}
