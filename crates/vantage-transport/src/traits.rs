//! Transport trait definitions

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;

use crate::error::Result;

/// Events that can occur on a transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Connection established
    Connected,
    /// Connection closed (clean or error)
    Disconnected { reason: Option<String> },
    /// Data received
    Data(Bytes),
    /// Error occurred
    Error(String),
}

/// Handle for sending data to one connection.
///
/// `send` enqueues and returns immediately. A full queue is an error
/// ([`crate::TransportError::QueueFull`]), never a stall — this is what
/// lets broadcast fan-out skip a slow peer without delaying the rest.
pub trait TransportSender: Send + Sync {
    /// Enqueue data for delivery
    fn send(&self, data: Bytes) -> Result<()>;

    /// Check if the connection is still open
    fn is_connected(&self) -> bool;

    /// Request the connection be closed
    fn close(&self);
}

/// Trait for receiving events from one connection
#[async_trait]
pub trait TransportReceiver: Send {
    /// Receive the next event; `None` means the connection is gone
    async fn recv(&mut self) -> Option<TransportEvent>;
}

/// Trait for transport servers (listeners)
#[async_trait]
pub trait TransportServer: Send + Sync {
    /// The sender type for accepted connections
    type Sender: TransportSender;
    /// The receiver type for accepted connections
    type Receiver: TransportReceiver;

    /// Accept a new connection
    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)>;

    /// Get the local address
    fn local_addr(&self) -> Result<SocketAddr>;
}
