//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("not connected")]
    NotConnected,

    /// The peer's outbound queue is full. Sends are never allowed to
    /// block, so a slow consumer surfaces here instead of stalling the
    /// caller.
    #[error("send queue full")]
    QueueFull,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
