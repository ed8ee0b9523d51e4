//! In-process channel transport
//!
//! Gives tests a real bidirectional connection without sockets: the same
//! sender/receiver halves the WebSocket transport produces, backed by
//! bounded channels so queue-full behavior is reproducible.

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{Result, TransportError};
use crate::traits::{TransportEvent, TransportReceiver, TransportSender, TransportServer};

/// Default per-direction queue depth
pub const DEFAULT_QUEUE: usize = 64;

/// Create a paired listener and connector
pub fn listener() -> (MemoryListener, MemoryConnector) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    (
        MemoryListener { accept_rx },
        MemoryConnector { accept_tx },
    )
}

struct Pending {
    sender: MemorySender,
    receiver: MemoryReceiver,
}

/// Client-side handle that opens new in-process connections
#[derive(Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<Pending>,
}

impl MemoryConnector {
    /// Open a connection with the default queue depth
    pub fn connect(&self) -> Result<(MemorySender, MemoryReceiver)> {
        self.connect_with_capacity(DEFAULT_QUEUE)
    }

    /// Open a connection with an explicit per-direction queue depth
    pub fn connect_with_capacity(
        &self,
        capacity: usize,
    ) -> Result<(MemorySender, MemoryReceiver)> {
        let (to_server_tx, to_server_rx) = mpsc::channel(capacity);
        let (to_client_tx, to_client_rx) = mpsc::channel(capacity);
        let open = Arc::new(AtomicBool::new(true));

        let pending = Pending {
            sender: MemorySender {
                tx: to_client_tx,
                open: open.clone(),
            },
            receiver: MemoryReceiver { rx: to_server_rx },
        };

        self.accept_tx
            .send(pending)
            .map_err(|_| TransportError::ConnectionFailed("listener dropped".into()))?;

        Ok((
            MemorySender {
                tx: to_server_tx,
                open,
            },
            MemoryReceiver { rx: to_client_rx },
        ))
    }
}

/// In-process sender half
pub struct MemorySender {
    tx: mpsc::Sender<TransportEvent>,
    open: Arc<AtomicBool>,
}

impl TransportSender for MemorySender {
    fn send(&self, data: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        match self.tx.try_send(TransportEvent::Data(data)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(TransportError::ConnectionClosed),
        }
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
        let _ = self
            .tx
            .try_send(TransportEvent::Disconnected { reason: None });
    }
}

/// In-process receiver half
pub struct MemoryReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for MemoryReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// In-process listener
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<Pending>,
}

#[async_trait]
impl TransportServer for MemoryListener {
    type Sender = MemorySender;
    type Receiver = MemoryReceiver;

    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)> {
        let pending = self
            .accept_rx
            .recv()
            .await
            .ok_or(TransportError::ConnectionClosed)?;
        let addr: SocketAddr = "127.0.0.1:0"
            .parse()
            .map_err(|_| TransportError::ConnectionFailed("bad loopback addr".into()))?;
        Ok((pending.sender, pending.receiver, addr))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        "127.0.0.1:0"
            .parse()
            .map_err(|_| TransportError::ConnectionFailed("bad loopback addr".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn data_flows_both_ways() {
        let (mut listener, connector) = listener();
        let (client_tx, mut client_rx) = connector.connect().unwrap();
        let (server_tx, mut server_rx, _) = listener.accept().await.unwrap();

        client_tx.send(Bytes::from_static(b"up")).unwrap();
        match server_rx.recv().await {
            Some(TransportEvent::Data(d)) => assert_eq!(&d[..], b"up"),
            other => panic!("unexpected event: {other:?}"),
        }

        server_tx.send(Bytes::from_static(b"down")).unwrap();
        match client_rx.recv().await {
            Some(TransportEvent::Data(d)) => assert_eq!(&d[..], b"down"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_surfaces_disconnect() {
        let (mut listener, connector) = listener();
        let (client_tx, _client_rx) = connector.connect().unwrap();
        let (server_tx, mut server_rx, _) = listener.accept().await.unwrap();

        client_tx.close();
        match server_rx.recv().await {
            Some(TransportEvent::Disconnected { .. }) => {}
            other => panic!("unexpected event: {other:?}"),
        }

        assert!(!server_tx.is_connected());
        assert!(matches!(
            server_tx.send(Bytes::from_static(b"x")),
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn full_queue_is_an_error_not_a_stall() {
        let (mut listener, connector) = listener();
        let (_client_tx, _client_rx) = connector.connect_with_capacity(1).unwrap();
        let (server_tx, _server_rx, _) = listener.accept().await.unwrap();

        server_tx.send(Bytes::from_static(b"1")).unwrap();
        assert!(matches!(
            server_tx.send(Bytes::from_static(b"2")),
            Err(TransportError::QueueFull)
        ));
    }
}
