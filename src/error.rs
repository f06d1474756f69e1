//! Error types for the client.

use thiserror::Error;

/// Main error type for client operations.
///
/// Once a subscription has started, errors are never returned to the caller
/// directly; they travel as the cause on the drop callback.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid subscription settings: {0}")]
    InvalidSettings(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("event handler failed: {0}")]
    EventHandler(String),

    #[error("live queue overflow: {buffered} events buffered, limit is {limit}")]
    LiveQueueOverflow { buffered: usize, limit: usize },

    #[error("subscription dropped by server: {0}")]
    SubscriptionDropped(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
