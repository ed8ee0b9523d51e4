//! Binary frame encoding/decoding
//!
//! Vantage frame format:
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Byte 0:     Magic (0x56 = 'V')                       │
//! │ Byte 1:     Protocol version                         │
//! │ Bytes 2-5:  Payload length (uint32 big-endian)       │
//! ├──────────────────────────────────────────────────────┤
//! │ Payload (MessagePack encoded)                        │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The length field is 32-bit because telemetry frames carry full
//! screenshots; a u16 limit would truncate them.

use crate::{Error, Result, MAGIC_BYTE, PROTOCOL_VERSION};
use bytes::{BufMut, Bytes, BytesMut};

/// Frame header size
pub const HEADER_SIZE: usize = 6;

/// Maximum payload size (screenshots dominate; 8 MiB headroom)
pub const MAX_PAYLOAD_SIZE: usize = 8 * 1024 * 1024;

/// A Vantage frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub version: u8,
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame with payload at the current protocol version
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: payload.into(),
        }
    }

    /// Encode this frame to bytes
    pub fn encode(&self) -> Result<Bytes> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge(self.payload.len()));
        }

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u8(MAGIC_BYTE);
        buf.put_u8(self.version);
        buf.put_u32(self.payload.len() as u32);
        buf.extend_from_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Decode a frame from a complete buffer (one transport message = one frame)
    pub fn decode(buf: &[u8]) -> Result<Frame> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                needed: HEADER_SIZE,
                have: buf.len(),
            });
        }

        if buf[0] != MAGIC_BYTE {
            return Err(Error::InvalidMagic(buf[0]));
        }

        let version = buf[1];
        if version != PROTOCOL_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let len = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
        if len > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge(len));
        }
        if buf.len() < HEADER_SIZE + len {
            return Err(Error::BufferTooSmall {
                needed: HEADER_SIZE + len,
                have: buf.len(),
            });
        }

        Ok(Frame {
            version,
            payload: Bytes::copy_from_slice(&buf[HEADER_SIZE..HEADER_SIZE + len]),
        })
    }
}
