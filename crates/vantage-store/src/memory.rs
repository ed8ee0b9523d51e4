//! In-memory store for tests and ephemeral deployments.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{DeviceRecord, DeviceStore, EventLog, LogRecord, Result, StoreError};
use vantage_core::Timestamp;

/// Hash-map backed store with the same semantics as the `SQLite` one.
#[derive(Default)]
pub struct MemoryStore {
    devices: Mutex<HashMap<String, DeviceRecord>>,
    logs: Mutex<Vec<LogRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStore for MemoryStore {
    fn upsert_device(&self, device_id: &str, default_name: &str, now: Timestamp) -> Result<()> {
        let mut devices = self.devices.lock();
        devices
            .entry(device_id.to_string())
            .and_modify(|rec| rec.last_seen = now)
            .or_insert_with(|| DeviceRecord {
                device_id: device_id.to_string(),
                name: default_name.to_string(),
                group: None,
                first_seen: now,
                last_seen: now,
            });
        Ok(())
    }

    fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>> {
        Ok(self.devices.lock().get(device_id).cloned())
    }

    fn devices(&self) -> Result<Vec<DeviceRecord>> {
        let mut all: Vec<DeviceRecord> = self.devices.lock().values().cloned().collect();
        all.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(all)
    }

    fn set_name(&self, device_id: &str, name: &str) -> Result<()> {
        let mut devices = self.devices.lock();
        let rec = devices
            .get_mut(device_id)
            .ok_or_else(|| StoreError::DeviceNotFound(device_id.to_string()))?;
        rec.name = name.to_string();
        Ok(())
    }

    fn set_group(&self, device_id: &str, group: Option<&str>) -> Result<()> {
        let mut devices = self.devices.lock();
        let rec = devices
            .get_mut(device_id)
            .ok_or_else(|| StoreError::DeviceNotFound(device_id.to_string()))?;
        rec.group = group.map(str::to_string);
        Ok(())
    }
}

impl EventLog for MemoryStore {
    fn append(&self, record: &LogRecord) -> Result<()> {
        self.logs.lock().push(record.clone());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let logs = self.logs.lock();
        Ok(logs.iter().rev().take(limit).cloned().collect())
    }
}
