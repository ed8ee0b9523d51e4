//! Timestamp helpers
//!
//! All wire timestamps are Unix epoch milliseconds.

use std::time::{SystemTime, UNIX_EPOCH};

/// Timestamp type (milliseconds since the Unix epoch)
pub type Timestamp = u64;

/// Current Unix timestamp in milliseconds
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Current Unix timestamp in seconds (token `iat`/`exp` resolution)
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
