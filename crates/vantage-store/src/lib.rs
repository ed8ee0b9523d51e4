//! Durable device registry and event log.
//!
//! The relay treats storage as advisory: every store call happens off the
//! connection hot path, and a storage failure never terminates a session.
//! [`DeviceStore`] remembers endpoints across restarts (so an operator can
//! rename or group a device once), [`EventLog`] keeps an audit trail of
//! connects, disconnects, and control actions.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};

use vantage_core::Timestamp;

/// Storage error type
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("device not found: {0}")]
    DeviceNotFound(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A device the relay has seen at least once.
///
/// `device_id` is the stable identifier the endpoint reports about itself,
/// not the per-connection id. `name` and `group` are operator-assigned and
/// survive reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    pub name: String,
    pub group: Option<String>,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
}

/// Severity of an audit log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Success,
    Danger,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Success => "success",
            Severity::Danger => "danger",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "warn" => Severity::Warn,
            "success" => Severity::Success,
            "danger" => Severity::Danger,
            _ => Severity::Info,
        }
    }
}

/// One audit trail entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub device_id: Option<String>,
    pub message: String,
    pub severity: Severity,
    pub timestamp: Timestamp,
}

/// Persistent device registry.
///
/// Implementations are called from blocking contexts only; methods are sync.
pub trait DeviceStore: Send + Sync {
    /// Record that a device is online. Creates the row on first sight,
    /// otherwise bumps `last_seen` without touching the operator-assigned
    /// name or group.
    fn upsert_device(&self, device_id: &str, default_name: &str, now: Timestamp) -> Result<()>;

    fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>>;

    /// All known devices, most recently seen first.
    fn devices(&self) -> Result<Vec<DeviceRecord>>;

    fn set_name(&self, device_id: &str, name: &str) -> Result<()>;

    fn set_group(&self, device_id: &str, group: Option<&str>) -> Result<()>;
}

/// Append-only audit trail.
pub trait EventLog: Send + Sync {
    fn append(&self, record: &LogRecord) -> Result<()>;

    /// Most recent entries, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<LogRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_string_roundtrip() {
        for sev in [
            Severity::Info,
            Severity::Warn,
            Severity::Success,
            Severity::Danger,
        ] {
            assert_eq!(Severity::from_str_lossy(sev.as_str()), sev);
        }
    }

    #[test]
    fn unknown_severity_degrades_to_info() {
        assert_eq!(Severity::from_str_lossy("critical"), Severity::Info);
        assert_eq!(Severity::from_str_lossy(""), Severity::Info);
    }
}
