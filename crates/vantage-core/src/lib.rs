//! Vantage Core
//!
//! Core types and protocol primitives for the Vantage monitoring relay.
//!
//! This crate provides:
//! - Wire message types ([`Inbound`], [`Outbound`]) — the closed set of
//!   events a connection may send or receive
//! - Binary frame encoding/decoding ([`Frame`], [`codec`])
//! - Authentication primitives ([`CredentialGateway`], [`TokenGateway`])
//! - Timestamp helpers ([`time`])

pub mod auth;
pub mod codec;
pub mod error;
pub mod frame;
pub mod time;
pub mod types;

pub use auth::{CredentialGateway, TokenGateway};
pub use codec::{decode, encode};
pub use error::{Error, Result};
pub use frame::Frame;
pub use time::{now_millis, Timestamp};
pub use types::*;

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Magic byte for frame identification
pub const MAGIC_BYTE: u8 = 0x56; // 'V' for Vantage

/// Default WebSocket port
pub const DEFAULT_WS_PORT: u16 = 3050;

/// WebSocket subprotocol identifier
pub const WS_SUBPROTOCOL: &str = "vantage.v1";
