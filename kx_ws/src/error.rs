use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("WebSocket error: {0}")]
    Websocket(#[from] tungstenite::Error),

    #[error("Failed to connect: {0}")]
    ConnectFailed(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
