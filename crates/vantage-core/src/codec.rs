//! Message codec
//!
//! One transport message carries one frame; the payload is MessagePack with
//! named keys so the tagged enums in [`crate::types`] survive the trip.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Frame, Result};
use bytes::Bytes;

/// Encode a message into a framed buffer
pub fn encode<T: Serialize>(msg: &T) -> Result<Bytes> {
    let payload = rmp_serde::to_vec_named(msg)?;
    Frame::new(payload).encode()
}

/// Decode a message from a framed buffer
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    let frame = Frame::decode(data)?;
    Ok(rmp_serde::from_slice(&frame.payload)?)
}
