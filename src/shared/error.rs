//! Synchronization Error Types
//!
//! Centralized error taxonomy for the real-time core. Every variant is
//! absorbed at the boundary that detected it; none of them is allowed to
//! escape `dispatch` or `emit`.

/// Why a transport link failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    /// TCP/TLS/websocket level failure
    #[error("network error: {0}")]
    Network(String),
    /// Handshake did not finish within the configured window
    #[error("handshake timed out")]
    Timeout,
    /// Server refused the credential (Socket.IO `CONNECT_ERROR`)
    #[error("connection rejected: {0}")]
    Rejected(String),
    /// Peer spoke something we could not decode during the handshake
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Link closed by the server or by a missed ping
    #[error("connection closed: {0}")]
    Closed(String),
}

impl TransportFailure {
    /// Whether a supervising policy may retry after this failure.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportFailure::Rejected(_))
    }
}

/// Real-time core error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Unauthenticated: no credential available for handshake")]
    Unauthenticated,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportFailure),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Client event loop has stopped")]
    Stopped,
}
