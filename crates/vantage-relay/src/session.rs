//! Session management
//!
//! A connection becomes a session only after it authenticates; until then it
//! is just an anonymous transport. The two session kinds never mix: a client
//! pushes telemetry, an admin observes and commands.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use serde_json::Value as Json;

use vantage_core::{codec, ClientSnapshot, ClientStatus, Outbound, Timestamp};
use vantage_transport::{TransportError, TransportSender};

use crate::error::Result;

/// Connection identifier, unique per accepted transport connection
pub type ConnectionId = String;

/// What an authenticated connection is.
///
/// Held by the connection task; every message handler matches on this to
/// decide whether the sender is allowed to perform the operation.
pub enum Identity {
    Client(Arc<ClientSession>),
    Admin(Arc<AdminSession>),
}

impl Identity {
    pub fn connection_id(&self) -> &str {
        match self {
            Identity::Client(s) => &s.id,
            Identity::Admin(s) => &s.id,
        }
    }
}

/// An authenticated monitored endpoint
pub struct ClientSession {
    /// Connection ID (session-scoped)
    pub id: ConnectionId,
    /// Stable device identity, survives reconnects
    pub device_id: String,
    /// Display name, resolved from the device registry at authentication
    pub name: String,
    /// Logical group label
    pub group: String,
    /// Capability/info blob the endpoint supplied at authentication
    pub info: Json,
    /// Authentication time (epoch millis)
    pub connected_at: Timestamp,
    /// Receive time of the most recent telemetry push
    last_telemetry: RwLock<Option<Timestamp>>,
    sender: Arc<dyn TransportSender>,
}

impl ClientSession {
    pub fn new(
        id: ConnectionId,
        device_id: String,
        name: String,
        group: String,
        info: Json,
        connected_at: Timestamp,
        sender: Arc<dyn TransportSender>,
    ) -> Self {
        Self {
            id,
            device_id,
            name,
            group,
            info,
            connected_at,
            last_telemetry: RwLock::new(None),
            sender,
        }
    }

    /// Send an event to this endpoint
    pub fn send(&self, msg: &Outbound) -> Result<()> {
        let bytes = codec::encode(msg)?;
        self.sender.send(bytes)?;
        Ok(())
    }

    pub fn record_telemetry(&self, at: Timestamp) {
        *self.last_telemetry.write() = Some(at);
    }

    pub fn last_telemetry(&self) -> Option<Timestamp> {
        *self.last_telemetry.read()
    }

    /// Directory view of this session
    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            connection: self.id.clone(),
            device: self.device_id.clone(),
            name: self.name.clone(),
            group: self.group.clone(),
            info: self.info.clone(),
            connected_at: self.connected_at,
            last_telemetry: self.last_telemetry(),
            status: ClientStatus::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    /// Force-close the underlying transport
    pub fn close(&self) {
        self.sender.close();
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("device_id", &self.device_id)
            .field("name", &self.name)
            .field("group", &self.group)
            .finish()
    }
}

/// An authenticated operator console
pub struct AdminSession {
    pub id: ConnectionId,
    /// Principal the session token was issued to
    pub principal: String,
    pub connected_at: Timestamp,
    sender: Arc<dyn TransportSender>,
}

impl AdminSession {
    pub fn new(
        id: ConnectionId,
        principal: String,
        connected_at: Timestamp,
        sender: Arc<dyn TransportSender>,
    ) -> Self {
        Self {
            id,
            principal,
            connected_at,
            sender,
        }
    }

    pub fn send(&self, msg: &Outbound) -> Result<()> {
        let bytes = codec::encode(msg)?;
        self.sender.send(bytes)?;
        Ok(())
    }

    /// Send pre-encoded bytes. Used by fan-out paths that encode once and
    /// deliver to many admins; a full queue is the caller's signal to drop
    /// this admin's copy, not to retry.
    pub fn send_raw(&self, data: Bytes) -> std::result::Result<(), TransportError> {
        self.sender.send(data)
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }
}

impl std::fmt::Debug for AdminSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSession")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .finish()
    }
}
