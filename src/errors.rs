use tokio_tungstenite::tungstenite;

pub type PubsubResult<T> = Result<T, PubsubError>;

#[derive(thiserror::Error, Debug)]
pub enum PubsubError {
    #[error("WebSocketError {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("MalformedFrame {0}")]
    MalformedFrame(#[from] serde_json::Error),
    #[error("UnexpectedFrame {0}")]
    UnexpectedFrame(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Subscription worker stopped")]
    WorkerStopped,
}
