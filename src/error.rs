//! Error types for the depth replica

use thiserror::Error;

/// Errors raised while maintaining the order book replica
#[derive(Error, Debug)]
pub enum ReplicaError {
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    /// Peer closed the connection or the stream ended
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// Snapshot or diff payload that could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Snapshot fetch error: {0}")]
    SnapshotFetch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Max reconnection attempts exceeded ({0})")]
    MaxReconnectAttemptsExceeded(u32),

    /// No snapshot could be installed within the retry budget
    #[error("Failed to initialize order book after {attempts} attempts: {reason}")]
    Initialization { attempts: u32, reason: String },

    /// The run was cancelled while waiting on the network
    #[error("Cancelled")]
    Cancelled,
}

impl ReplicaError {
    /// Whether the run loop can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReplicaError::WebSocketConnection(_)
                | ReplicaError::Disconnected(_)
                | ReplicaError::Protocol(_)
                | ReplicaError::SnapshotFetch(_)
                | ReplicaError::ConnectionTimeout
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ReplicaError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ReplicaError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for ReplicaError {
    fn from(err: serde_json::Error) -> Self {
        ReplicaError::Protocol(err.to_string())
    }
}

impl From<reqwest::Error> for ReplicaError {
    fn from(err: reqwest::Error) -> Self {
        ReplicaError::SnapshotFetch(err.to_string())
    }
}

impl From<prometheus::Error> for ReplicaError {
    fn from(err: prometheus::Error) -> Self {
        ReplicaError::Metrics(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReplicaError>;
