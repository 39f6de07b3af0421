use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("injection backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("action '{action}' failed: {reason}")]
    ActionFailed { action: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;
