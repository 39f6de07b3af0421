use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("connection already closed at registration")]
    ConnectionAlreadyClosed,

    #[error("send timed out (slow consumer)")]
    SendTimeout,

    #[error("client outbound channel closed")]
    ChannelClosed,

    #[error("bridge server already running")]
    AlreadyRunning,

    #[error("bridge server not started")]
    NotStarted,
}

pub type Result<T> = std::result::Result<T, RelayError>;
