//! Relay engine
//!
//! The relay is transport-agnostic: it accepts connections from anything
//! implementing `TransportServer` and runs one task per connection. A
//! connection starts anonymous, becomes a client or admin session on its
//! first successful authentication message, and is torn down from the
//! registry the moment its receive loop ends.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vantage_core::TokenGateway;
//! use vantage_relay::{Registry, Relay, RelayConfig};
//! use vantage_store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryStore::new());
//!     let registry = Arc::new(Registry::new(
//!         Arc::new(TokenGateway::new(b"secret")),
//!         store.clone(),
//!         store,
//!     ));
//!     let relay = Relay::new(RelayConfig::default(), registry);
//!     relay.serve_websocket("0.0.0.0:3050").await.unwrap();
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use vantage_core::{codec, Inbound, Outbound, Role};
use vantage_transport::{
    TransportError, TransportEvent, TransportReceiver, TransportSender, TransportServer,
    WebSocketServer,
};

use crate::error::{AuthError, Result};
use crate::registry::{Registry, Removed};
use crate::session::Identity;

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Server name, reported in logs
    pub name: String,
    /// Maximum concurrent sessions (clients plus admins)
    pub max_sessions: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: "Vantage Relay".to_string(),
            max_sessions: 256,
        }
    }
}

/// Vantage relay
pub struct Relay {
    config: RelayConfig,
    registry: Arc<Registry>,
    running: Arc<RwLock<bool>>,
}

impl Relay {
    pub fn new(config: RelayConfig, registry: Arc<Registry>) -> Self {
        Self {
            config,
            registry,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Serve using any `TransportServer` implementation.
    pub async fn serve_on<S>(&self, mut server: S) -> Result<()>
    where
        S: TransportServer + 'static,
        S::Sender: 'static,
        S::Receiver: 'static,
    {
        info!("{} accepting connections", self.config.name);
        *self.running.write() = true;

        while *self.running.read() {
            match server.accept().await {
                Ok((sender, receiver, addr)) => {
                    info!("New connection from {}", addr);
                    self.handle_connection(Arc::new(sender), receiver, addr);
                }
                Err(TransportError::ConnectionClosed) => {
                    info!("Listener closed");
                    break;
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Start the relay on a WebSocket listener.
    pub async fn serve_websocket(&self, addr: &str) -> Result<()> {
        let server = WebSocketServer::bind(addr).await?;
        info!("WebSocket server listening on {}", addr);
        self.serve_on(server).await
    }

    /// Handle a new connection
    fn handle_connection(
        &self,
        sender: Arc<dyn TransportSender>,
        mut receiver: impl TransportReceiver + 'static,
        addr: SocketAddr,
    ) {
        let registry = Arc::clone(&self.registry);
        let config = self.config.clone();
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let conn_id = uuid::Uuid::new_v4().to_string();
            let mut identity: Option<Identity> = None;

            while *running.read() {
                match receiver.recv().await {
                    Some(TransportEvent::Data(data)) => match codec::decode::<Inbound>(&data) {
                        Ok(msg) => {
                            let outcome = dispatch(
                                msg, &mut identity, &conn_id, &sender, &registry, &config,
                            )
                            .await;
                            if matches!(outcome, Dispatch::Close) {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Decode error from {}: {}", addr, e);
                        }
                    },
                    Some(TransportEvent::Disconnected { reason }) => {
                        info!("Connection {} closed: {:?}", addr, reason);
                        break;
                    }
                    Some(TransportEvent::Error(e)) => {
                        error!("Transport error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }

            // Cleanup: deregister, then tell the admins if a client left.
            if let Some(Removed::Client(session)) = registry.remove(&conn_id) {
                info!("Removing client session {} ({})", conn_id, session.name);
                broadcast_to_admins(
                    &registry,
                    &Outbound::ClientDisconnected {
                        connection: session.id.clone(),
                        name: session.name.clone(),
                    },
                );
            }
            sender.close();
        });
    }

    /// Stop the relay
    pub fn stop(&self) {
        *self.running.write() = false;
    }

    pub fn session_count(&self) -> usize {
        self.registry.session_count()
    }
}

/// What the connection loop should do after a message
enum Dispatch {
    Continue,
    Close,
}

/// Handle one inbound message
async fn dispatch(
    msg: Inbound,
    identity: &mut Option<Identity>,
    conn_id: &str,
    sender: &Arc<dyn TransportSender>,
    registry: &Arc<Registry>,
    config: &RelayConfig,
) -> Dispatch {
    match msg {
        Inbound::AuthenticateClient {
            credential_token,
            client_info,
        } => {
            if identity.is_some() {
                debug!("Connection {} re-authenticated, ignoring", conn_id);
                return Dispatch::Continue;
            }
            if registry.session_count() >= config.max_sessions {
                send_to(sender, &auth_error(&AuthError::SessionLimit));
                return Dispatch::Close;
            }

            match registry
                .authenticate_client(conn_id, &credential_token, client_info, sender.clone())
                .await
            {
                Ok(session) => {
                    send_to(
                        sender,
                        &Outbound::AuthSuccess {
                            message: "Authentication successful".to_string(),
                            role: Some(Role::Client),
                            client_id: Some(conn_id.to_string()),
                        },
                    );
                    broadcast_to_admins(registry, &Outbound::ClientConnected(session.snapshot()));
                    *identity = Some(Identity::Client(session));
                    Dispatch::Continue
                }
                Err(e) => {
                    warn!("Client auth failed for {}: {}", conn_id, e);
                    send_to(sender, &auth_error(&e));
                    Dispatch::Close
                }
            }
        }

        Inbound::AuthenticateAdmin { session_token } => {
            if identity.is_some() {
                debug!("Connection {} re-authenticated, ignoring", conn_id);
                return Dispatch::Continue;
            }
            if registry.session_count() >= config.max_sessions {
                send_to(sender, &auth_error(&AuthError::SessionLimit));
                return Dispatch::Close;
            }

            match registry
                .authenticate_admin(conn_id, &session_token, sender.clone())
                .await
            {
                Ok(session) => {
                    send_to(
                        sender,
                        &Outbound::AuthSuccess {
                            message: "Authentication successful".to_string(),
                            role: Some(Role::Admin),
                            client_id: None,
                        },
                    );
                    // Directory snapshot goes out before any later broadcast
                    // for this admin can be observed.
                    let _ = session.send(&Outbound::ClientsList {
                        clients: registry.list_clients(),
                    });
                    *identity = Some(Identity::Admin(session));
                    Dispatch::Continue
                }
                Err(e) => {
                    warn!("Admin auth failed for {}: {}", conn_id, e);
                    send_to(sender, &auth_error(&e));
                    Dispatch::Close
                }
            }
        }

        Inbound::ScreenData {
            screenshot,
            stats,
            timestamp,
            quality,
        } => {
            let Some(Identity::Client(session)) = identity else {
                debug!("Dropping screen-data from unidentified connection {}", conn_id);
                return Dispatch::Continue;
            };
            registry.record_telemetry(&session.id);
            broadcast_to_admins(
                registry,
                &Outbound::ScreenUpdate {
                    connection: session.id.clone(),
                    name: session.name.clone(),
                    screenshot,
                    stats,
                    timestamp,
                    quality,
                },
            );
            Dispatch::Continue
        }

        Inbound::RequestClientInfo { target } => {
            let Some(Identity::Admin(admin)) = identity else {
                debug!("Dropping request-client-info from non-admin {}", conn_id);
                return Dispatch::Continue;
            };
            match registry.lookup_client(&target) {
                Some(client) => {
                    if let Err(e) = admin.send(&Outbound::ClientInfo(client.snapshot())) {
                        debug!("client-info delivery to {} failed: {}", admin.id, e);
                    }
                }
                None => debug!("request-client-info for unknown target {}", target),
            }
            Dispatch::Continue
        }

        Inbound::ControlClient { target, action } => {
            let Some(Identity::Admin(admin)) = identity else {
                debug!("Dropping control-client from non-admin {}", conn_id);
                return Dispatch::Continue;
            };
            let Some(client) = registry.lookup_client(&target) else {
                debug!("control-client for unknown target {}", target);
                return Dispatch::Continue;
            };

            if let Err(e) = client.send(&Outbound::ControlCommand { action }) {
                warn!("control delivery to {} failed: {}", client.id, e);
            }
            info!(
                "Admin {} issued {:?} for client {}",
                admin.principal, action, client.name
            );
            Dispatch::Continue
        }

        Inbound::TerminalCommand { target, command } => {
            let Some(Identity::Admin(admin)) = identity else {
                debug!("Dropping terminal-command from non-admin {}", conn_id);
                return Dispatch::Continue;
            };
            let Some(client) = registry.lookup_client(&target) else {
                // No log entry for commands that never reached a client.
                debug!("terminal-command for unknown target {}", target);
                return Dispatch::Continue;
            };
            registry.record_terminal_command(&client, &command);
            if let Err(e) = client.send(&Outbound::TerminalCommand {
                command,
                admin: admin.id.clone(),
            }) {
                warn!("terminal-command delivery to {} failed: {}", client.id, e);
            }
            Dispatch::Continue
        }

        Inbound::TerminalOutput {
            admin,
            output,
            command,
        } => {
            // Only clients may emit terminal output; the admin return
            // address inside the message is trusted no further than that.
            let Some(Identity::Client(session)) = identity else {
                debug!("Dropping terminal-output from non-client {}", conn_id);
                return Dispatch::Continue;
            };
            let Some(admin_session) = registry.lookup_admin(&admin) else {
                debug!("terminal-output for unknown admin {}", admin);
                return Dispatch::Continue;
            };
            if let Err(e) = admin_session.send(&Outbound::TerminalOutput {
                output,
                command,
                client: session.id.clone(),
            }) {
                debug!("terminal-output delivery to {} failed: {}", admin, e);
            }
            Dispatch::Continue
        }
    }
}

fn auth_error(e: &AuthError) -> Outbound {
    Outbound::AuthError {
        message: e.to_string(),
    }
}

/// Send an event to an anonymous connection, logging failures
fn send_to(sender: &Arc<dyn TransportSender>, msg: &Outbound) {
    match codec::encode(msg) {
        Ok(bytes) => {
            if let Err(e) = sender.send(bytes) {
                debug!("{} delivery failed: {}", msg.event_name(), e);
            }
        }
        Err(e) => error!("Failed to encode {}: {}", msg.event_name(), e),
    }
}

/// Fan an event out to every admin. Encoded once; a slow or closed admin
/// loses its copy and nobody else waits.
fn broadcast_to_admins(registry: &Arc<Registry>, msg: &Outbound) {
    let bytes = match codec::encode(msg) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to encode {}: {}", msg.event_name(), e);
            return;
        }
    };

    for admin in registry.admins() {
        match admin.send_raw(bytes.clone()) {
            Ok(()) => {}
            Err(TransportError::QueueFull) => {
                warn!("Admin {} queue full, dropping {}", admin.id, msg.event_name());
            }
            Err(e) => {
                debug!("{} delivery to admin {} failed: {}", msg.event_name(), admin.id, e);
            }
        }
    }
}
