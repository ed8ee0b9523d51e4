//! Common test helpers for Vantage tests
//!
//! Provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - A relay harness over the in-process transport with RAII cleanup
//! - Typed peers that speak the wire protocol

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use vantage_core::{codec, Inbound, Outbound, TokenGateway};
use vantage_relay::{Registry, Relay, RelayConfig};
use vantage_store::MemoryStore;
use vantage_transport::memory::{self, MemoryConnector, MemoryReceiver, MemorySender};
use vantage_transport::{TransportEvent, TransportReceiver, TransportSender};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Signing secret every test harness uses
pub const TEST_SECRET: &[u8] = b"test-secret";

/// Find an available TCP port for tests that bind a real listener
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Issue an admin session token signed with [`TEST_SECRET`]
pub fn issue_admin_token(principal: &str) -> String {
    TokenGateway::new(TEST_SECRET)
        .issue_session_token(principal, Duration::from_secs(60))
        .unwrap()
}

/// A relay over the in-process transport, torn down on drop
pub struct TestRelay {
    relay: Arc<Relay>,
    connector: MemoryConnector,
    store: Arc<MemoryStore>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestRelay {
    /// Start a test relay with default configuration
    pub async fn start() -> Self {
        Self::start_with_config(RelayConfig {
            name: "Test Relay".to_string(),
            max_sessions: 64,
        })
        .await
    }

    /// Start a test relay with custom configuration
    pub async fn start_with_config(config: RelayConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(Registry::new(
            Arc::new(TokenGateway::new(TEST_SECRET)),
            store.clone(),
            store.clone(),
        ));
        let relay = Arc::new(Relay::new(config, registry));

        let (listener, connector) = memory::listener();
        let serve = Arc::clone(&relay);
        let handle = tokio::spawn(async move {
            let _ = serve.serve_on(listener).await;
        });

        // Accept loop is up once the spawned task has been polled; the
        // unbounded accept queue means connects before that are not lost.
        tokio::task::yield_now().await;

        Self {
            relay,
            connector,
            store,
            handle: Some(handle),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.relay.registry()
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Open an anonymous connection to the relay
    pub fn connect(&self) -> TestPeer {
        let (sender, receiver) = self.connector.connect().unwrap();
        TestPeer { sender, receiver }
    }

    /// Open a connection whose inbound queue holds at most `capacity`
    /// undelivered events, for backpressure tests
    pub fn connect_with_capacity(&self, capacity: usize) -> TestPeer {
        let (sender, receiver) = self.connector.connect_with_capacity(capacity).unwrap();
        TestPeer { sender, receiver }
    }

    /// Connect and authenticate a client endpoint. The credential token
    /// doubles as the persistent device id.
    pub async fn connect_client(&self, device_id: &str, hostname: &str) -> TestPeer {
        let mut peer = self.connect();
        peer.send(&Inbound::AuthenticateClient {
            credential_token: device_id.to_string(),
            client_info: serde_json::json!({ "hostname": hostname }),
        });
        match peer.recv().await {
            Some(Outbound::AuthSuccess { .. }) => peer,
            other => panic!("client auth failed: {other:?}"),
        }
    }

    /// Connect and authenticate an admin console.
    ///
    /// Consumes the `auth-success` and the initial `clients-list`; the
    /// returned directory is what the relay reported at auth time.
    pub async fn connect_admin(&self, principal: &str) -> (TestPeer, Vec<vantage_core::ClientSnapshot>) {
        let mut peer = self.connect();
        peer.send(&Inbound::AuthenticateAdmin {
            session_token: issue_admin_token(principal),
        });
        match peer.recv().await {
            Some(Outbound::AuthSuccess { .. }) => {}
            other => panic!("admin auth failed: {other:?}"),
        }
        match peer.recv().await {
            Some(Outbound::ClientsList { clients }) => (peer, clients),
            other => panic!("expected clients-list, got: {other:?}"),
        }
    }

    /// Stop the relay explicitly (also happens on drop)
    pub fn stop(&mut self) {
        self.relay.stop();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One side of a relay connection, speaking typed events
pub struct TestPeer {
    sender: MemorySender,
    receiver: MemoryReceiver,
}

impl TestPeer {
    /// Send an event to the relay
    pub fn send(&self, msg: &Inbound) {
        let bytes = codec::encode(msg).unwrap();
        self.sender.send(bytes).unwrap();
    }

    /// Send raw bytes, bypassing the codec
    pub fn send_raw(&self, bytes: &[u8]) {
        self.sender
            .send(bytes::Bytes::copy_from_slice(bytes))
            .unwrap();
    }

    /// Receive the next event with the default timeout.
    ///
    /// Returns `None` on timeout or when the relay closed the connection.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.recv_timeout(DEFAULT_TIMEOUT).await
    }

    /// Receive the next event within `max_wait`
    pub async fn recv_timeout(&mut self, max_wait: Duration) -> Option<Outbound> {
        let deadline = Instant::now() + max_wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.receiver.recv()).await {
                Ok(Some(TransportEvent::Data(data))) => {
                    return Some(codec::decode(&data).unwrap());
                }
                Ok(Some(TransportEvent::Disconnected { .. })) | Ok(None) => return None,
                Ok(Some(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// True once the relay has closed this connection
    pub async fn wait_closed(&mut self, max_wait: Duration) -> bool {
        self.recv_timeout(max_wait).await.is_none()
    }

    pub fn close(&self) {
        self.sender.close();
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }
}
