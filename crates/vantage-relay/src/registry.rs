//! Session registry
//!
//! Single source of truth for who is connected. Client and admin sessions
//! live in separate maps so role checks are structural rather than a flag
//! on a shared record. Durable storage is strictly off the hot path: the
//! only awaited store call is the device lookup during client auth, and
//! every write is fire-and-forget on the blocking pool.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value as Json;
use tracing::{debug, warn};

use vantage_core::{now_millis, ClientSnapshot, CredentialGateway};
use vantage_store::{DeviceStore, EventLog, LogRecord, Severity};
use vantage_transport::TransportSender;

use crate::error::AuthError;
use crate::session::{AdminSession, ClientSession, ConnectionId};

/// Fallback display name for endpoints that report no hostname
const UNKNOWN_DEVICE: &str = "Unknown device";

/// Fallback group label
const DEFAULT_GROUP: &str = "General";

/// What `Registry::remove` took out
pub enum Removed {
    Client(Arc<ClientSession>),
    Admin(Arc<AdminSession>),
}

/// Connection and session registry
pub struct Registry {
    clients: DashMap<ConnectionId, Arc<ClientSession>>,
    admins: DashMap<ConnectionId, Arc<AdminSession>>,
    gateway: Arc<dyn CredentialGateway>,
    devices: Arc<dyn DeviceStore>,
    events: Arc<dyn EventLog>,
}

impl Registry {
    pub fn new(
        gateway: Arc<dyn CredentialGateway>,
        devices: Arc<dyn DeviceStore>,
        events: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            clients: DashMap::new(),
            admins: DashMap::new(),
            gateway,
            devices,
            events,
        }
    }

    /// Authenticate a monitored endpoint and register its session.
    ///
    /// The device registry read is awaited so the session carries the
    /// operator-assigned name and group from the moment it exists; the
    /// `last_seen` bump and audit entry are not.
    pub async fn authenticate_client(
        &self,
        conn_id: &str,
        credential_token: &str,
        client_info: Json,
        sender: Arc<dyn TransportSender>,
    ) -> Result<Arc<ClientSession>, AuthError> {
        if !self.gateway.is_live_token(credential_token) {
            return Err(AuthError::InvalidCredential);
        }

        // The credential token IS the persistent device identity; declared
        // info never gets to pick one.
        let device_id = credential_token.to_string();
        let reported_name = client_info
            .get("hostname")
            .and_then(Json::as_str)
            .unwrap_or(UNKNOWN_DEVICE)
            .to_string();

        let record = {
            let devices = Arc::clone(&self.devices);
            let key = device_id.clone();
            tokio::task::spawn_blocking(move || devices.get_device(&key))
                .await
                .ok()
                .and_then(|r| {
                    r.map_err(|e| warn!("device lookup failed for {device_id}: {e}"))
                        .ok()
                })
                .flatten()
        };

        let name = record
            .as_ref()
            .map(|r| r.name.clone())
            .unwrap_or_else(|| reported_name.clone());
        let group = record
            .and_then(|r| r.group)
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());

        let now = now_millis();
        let session = Arc::new(ClientSession::new(
            conn_id.to_string(),
            device_id.clone(),
            name.clone(),
            group,
            client_info,
            now,
            sender,
        ));
        self.clients.insert(conn_id.to_string(), session.clone());

        {
            let devices = Arc::clone(&self.devices);
            let key = device_id.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = devices.upsert_device(&key, &reported_name, now) {
                    warn!("device upsert failed for {key}: {e}");
                }
            });
        }
        self.log_event(
            Some(device_id),
            format!("Client connected: {name}"),
            Severity::Success,
        );

        Ok(session)
    }

    /// Authenticate an operator console and register its session.
    pub async fn authenticate_admin(
        &self,
        conn_id: &str,
        session_token: &str,
        sender: Arc<dyn TransportSender>,
    ) -> Result<Arc<AdminSession>, AuthError> {
        let principal = self
            .gateway
            .decode_session_token(session_token)
            .ok_or(AuthError::InvalidSession)?;

        let session = Arc::new(AdminSession::new(
            conn_id.to_string(),
            principal.clone(),
            now_millis(),
            sender,
        ));
        self.admins.insert(conn_id.to_string(), session.clone());

        debug!("Admin connected: {principal}");

        Ok(session)
    }

    /// Remove whatever session this connection holds.
    pub fn remove(&self, conn_id: &str) -> Option<Removed> {
        if let Some((_, session)) = self.clients.remove(conn_id) {
            self.log_event(
                Some(session.device_id.clone()),
                format!("Client disconnected: {}", session.name),
                Severity::Warn,
            );
            return Some(Removed::Client(session));
        }
        if let Some((_, session)) = self.admins.remove(conn_id) {
            debug!("Admin disconnected: {}", session.principal);
            return Some(Removed::Admin(session));
        }
        None
    }

    /// Mark a telemetry push from a client connection. Returns the session
    /// so fan-out can reuse the resolved name; `None` for non-clients.
    pub fn record_telemetry(&self, conn_id: &str) -> Option<Arc<ClientSession>> {
        let session = self.clients.get(conn_id).map(|s| Arc::clone(&s))?;
        session.record_telemetry(now_millis());
        Some(session)
    }

    /// Audit a terminal command issued against a client.
    pub fn record_terminal_command(&self, session: &ClientSession, command: &str) {
        self.log_event(
            Some(session.device_id.clone()),
            format!("Terminal command for {}: {command}", session.name),
            Severity::Info,
        );
    }

    pub fn lookup_client(&self, conn_id: &str) -> Option<Arc<ClientSession>> {
        self.clients.get(conn_id).map(|s| Arc::clone(&s))
    }

    pub fn lookup_admin(&self, conn_id: &str) -> Option<Arc<AdminSession>> {
        self.admins.get(conn_id).map(|s| Arc::clone(&s))
    }

    /// Directory of all connected clients, oldest connection first.
    pub fn list_clients(&self) -> Vec<ClientSnapshot> {
        let mut list: Vec<ClientSnapshot> =
            self.clients.iter().map(|e| e.value().snapshot()).collect();
        list.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.connection.cmp(&b.connection))
        });
        list
    }

    /// All connected admin sessions, for fan-out.
    pub fn admins(&self) -> Vec<Arc<AdminSession>> {
        self.admins.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }

    pub fn session_count(&self) -> usize {
        self.clients.len() + self.admins.len()
    }

    /// Audit log write, fire-and-forget
    fn log_event(&self, device_id: Option<String>, message: String, severity: Severity) {
        debug!("{message}");
        let events = Arc::clone(&self.events);
        tokio::task::spawn_blocking(move || {
            let record = LogRecord {
                device_id,
                message,
                severity,
                timestamp: now_millis(),
            };
            if let Err(e) = events.append(&record) {
                warn!("audit log write failed: {e}");
            }
        });
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("clients", &self.clients.len())
            .field("admins", &self.admins.len())
            .finish_non_exhaustive()
    }
}
