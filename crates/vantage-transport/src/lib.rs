//! Vantage Transport
//!
//! The relay core is written against an abstract "connection" capability,
//! not any one transport. This crate defines that capability
//! ([`TransportSender`], [`TransportReceiver`], [`TransportServer`]) and
//! ships two implementations:
//!
//! - [`websocket`] — the production transport (tokio-tungstenite)
//! - [`memory`] — an in-process channel transport for deterministic tests
//!
//! Sends are enqueue-only and never block: a peer whose outbound queue is
//! full fails the send immediately instead of stalling the caller.

pub mod error;
pub mod memory;
pub mod traits;
pub mod websocket;

pub use error::{Result, TransportError};
pub use memory::{MemoryConnector, MemoryListener, MemoryReceiver, MemorySender};
pub use traits::{TransportEvent, TransportReceiver, TransportSender, TransportServer};
pub use websocket::{WebSocketConfig, WebSocketReceiver, WebSocketSender, WebSocketServer};
