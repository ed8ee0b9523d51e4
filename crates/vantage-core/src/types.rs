//! Wire message definitions
//!
//! Every event a connection can send or receive is a variant of one of two
//! closed enums, tagged by event name on the wire. Payloads are decoded and
//! validated once at the transport boundary; everything downstream operates
//! on typed data.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Role assigned to a connection after authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Admin,
}

/// Lifecycle status of a client session.
///
/// `Connected` is the only steady state; pause/resume is a fire-and-forget
/// command to the endpoint, not a tracked transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Connected,
}

/// Admin-issued control commands for a client endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Pause,
    Resume,
    Disconnect,
}

/// Directory view of a connected client, as carried by `clients-list`,
/// `client-connected`, and `client-info` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    /// Connection identifier (session-scoped, not stable across reconnects)
    pub connection: String,
    /// Persistent device identity
    pub device: String,
    /// Display name
    pub name: String,
    /// Logical group label
    pub group: String,
    /// Free-form capability/info blob supplied at authentication
    #[serde(default)]
    pub info: Json,
    /// Authentication time (epoch millis)
    pub connected_at: u64,
    /// Last telemetry time (epoch millis), if any received yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_telemetry: Option<u64>,
    pub status: ClientStatus,
}

/// Events accepted from a connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Inbound {
    /// Client authentication with a long-lived credential token
    #[serde(rename = "authenticate-client", rename_all = "camelCase")]
    AuthenticateClient {
        credential_token: String,
        #[serde(default)]
        client_info: Json,
    },

    /// Admin authentication with a short-lived signed session token
    #[serde(rename = "authenticate-admin", rename_all = "camelCase")]
    AuthenticateAdmin { session_token: String },

    /// Periodic telemetry push from an authenticated client
    #[serde(rename = "screen-data", rename_all = "camelCase")]
    ScreenData {
        /// Opaque screenshot payload (passed through unmodified)
        screenshot: String,
        /// CPU/memory/process snapshot
        #[serde(default)]
        stats: Json,
        /// Client-supplied capture time (epoch millis)
        timestamp: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality: Option<u32>,
    },

    /// Admin requests a directory snapshot of one client
    #[serde(rename = "request-client-info")]
    RequestClientInfo { target: String },

    /// Admin control command for a client (fire-and-forget)
    #[serde(rename = "control-client")]
    ControlClient {
        target: String,
        action: ControlAction,
    },

    /// Admin-to-client remote terminal command
    #[serde(rename = "terminal-command")]
    TerminalCommand { target: String, command: String },

    /// Client-to-admin remote terminal output, routed by the embedded
    /// admin return address
    #[serde(rename = "terminal-output")]
    TerminalOutput {
        admin: String,
        output: String,
        command: String,
    },
}

/// Events emitted to a connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outbound {
    /// Authentication failure; the connection is closed right after
    #[serde(rename = "auth-error")]
    AuthError { message: String },

    #[serde(rename = "auth-success", rename_all = "camelCase")]
    AuthSuccess {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// Full directory, sent once immediately after admin authentication
    #[serde(rename = "clients-list")]
    ClientsList { clients: Vec<ClientSnapshot> },

    #[serde(rename = "client-connected")]
    ClientConnected(ClientSnapshot),

    #[serde(rename = "client-disconnected")]
    ClientDisconnected { connection: String, name: String },

    /// Telemetry fan-out to admins. Best-effort, at-most-once per admin:
    /// a full or closed admin transport drops that admin's copy only.
    #[serde(rename = "screen-update", rename_all = "camelCase")]
    ScreenUpdate {
        connection: String,
        name: String,
        screenshot: String,
        stats: Json,
        timestamp: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality: Option<u32>,
    },

    #[serde(rename = "client-info")]
    ClientInfo(ClientSnapshot),

    #[serde(rename = "control-command")]
    ControlCommand { action: ControlAction },

    /// Terminal command delivered to a client; `admin` is the return address
    #[serde(rename = "terminal-command")]
    TerminalCommand { command: String, admin: String },

    /// Terminal output delivered back to an admin, tagged with the
    /// originating client connection
    #[serde(rename = "terminal-output")]
    TerminalOutput {
        output: String,
        command: String,
        client: String,
    },
}

impl Outbound {
    /// Wire event name for this message (logging and diagnostics)
    pub fn event_name(&self) -> &'static str {
        match self {
            Outbound::AuthError { .. } => "auth-error",
            Outbound::AuthSuccess { .. } => "auth-success",
            Outbound::ClientsList { .. } => "clients-list",
            Outbound::ClientConnected(_) => "client-connected",
            Outbound::ClientDisconnected { .. } => "client-disconnected",
            Outbound::ScreenUpdate { .. } => "screen-update",
            Outbound::ClientInfo(_) => "client-info",
            Outbound::ControlCommand { .. } => "control-command",
            Outbound::TerminalCommand { .. } => "terminal-command",
            Outbound::TerminalOutput { .. } => "terminal-output",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_tag_names() {
        let msg = Inbound::AuthenticateAdmin {
            session_token: "t".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "authenticate-admin");
        assert_eq!(json["sessionToken"], "t");
    }

    #[test]
    fn snapshot_field_names() {
        let snap = ClientSnapshot {
            connection: "c1".into(),
            device: "tok-A".into(),
            name: "Device-1".into(),
            group: "General".into(),
            info: serde_json::json!({"os": "linux"}),
            connected_at: 1,
            last_telemetry: None,
            status: ClientStatus::Connected,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["connectedAt"], 1);
        assert_eq!(json["status"], "connected");
        assert!(json.get("lastTelemetry").is_none());
    }

    #[test]
    fn control_action_wire_form() {
        let json = serde_json::to_value(ControlAction::Pause).unwrap();
        assert_eq!(json, "pause");
    }
}
