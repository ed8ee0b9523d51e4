//! `SQLite`-backed store.
//!
//! A single connection behind a mutex is enough here: writes are rare
//! (connect, disconnect, control actions) and always issued from blocking
//! tasks. WAL mode keeps readers from stalling behind them.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::{DeviceRecord, DeviceStore, EventLog, LogRecord, Result, Severity};
use vantage_core::Timestamp;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS devices (
    device_id  TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    grp        TEXT,
    first_seen INTEGER NOT NULL,
    last_seen  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS logs (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id TEXT,
    message   TEXT NOT NULL,
    severity  TEXT NOT NULL DEFAULT 'info',
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp);
";

/// `SQLite` store holding both the device registry and the audit log.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and bootstrap the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.as_ref().display(), "opened device database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn row_to_device(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeviceRecord> {
    Ok(DeviceRecord {
        device_id: row.get(0)?,
        name: row.get(1)?,
        group: row.get(2)?,
        first_seen: row.get(3)?,
        last_seen: row.get(4)?,
    })
}

impl DeviceStore for SqliteStore {
    fn upsert_device(&self, device_id: &str, default_name: &str, now: Timestamp) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO devices (device_id, name, first_seen, last_seen) \
             VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(device_id) DO UPDATE SET last_seen = ?3",
            params![device_id, default_name, now],
        )?;
        Ok(())
    }

    fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT device_id, name, grp, first_seen, last_seen \
                 FROM devices WHERE device_id = ?1",
                [device_id],
                row_to_device,
            )
            .optional()?;
        Ok(record)
    }

    fn devices(&self) -> Result<Vec<DeviceRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT device_id, name, grp, first_seen, last_seen \
             FROM devices ORDER BY last_seen DESC",
        )?;
        let rows = stmt.query_map([], row_to_device)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn set_name(&self, device_id: &str, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE devices SET name = ?2 WHERE device_id = ?1",
            params![device_id, name],
        )?;
        if changed == 0 {
            return Err(crate::StoreError::DeviceNotFound(device_id.to_string()));
        }
        Ok(())
    }

    fn set_group(&self, device_id: &str, group: Option<&str>) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE devices SET grp = ?2 WHERE device_id = ?1",
            params![device_id, group],
        )?;
        if changed == 0 {
            return Err(crate::StoreError::DeviceNotFound(device_id.to_string()));
        }
        Ok(())
    }
}

impl EventLog for SqliteStore {
    fn append(&self, record: &LogRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO logs (device_id, message, severity, timestamp) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.device_id,
                record.message,
                record.severity.as_str(),
                record.timestamp
            ],
        )?;
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT device_id, message, severity, timestamp \
             FROM logs ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            let severity: String = row.get(2)?;
            Ok(LogRecord {
                device_id: row.get(0)?,
                message: row.get(1)?,
                severity: Severity::from_str_lossy(&severity),
                timestamp: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
