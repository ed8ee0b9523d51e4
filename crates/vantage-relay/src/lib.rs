//! Vantage Relay
//!
//! The relay is the hub between monitored endpoints and operator consoles:
//! - Authenticates connections and tracks client/admin sessions
//! - Fans client telemetry out to every admin
//! - Routes admin commands (control, terminal) to the targeted client
//! - Keeps the device registry and audit log current
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vantage_core::TokenGateway;
//! use vantage_relay::{Registry, Relay, RelayConfig};
//! use vantage_store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let registry = Arc::new(Registry::new(
//!         Arc::new(TokenGateway::new(b"secret")),
//!         store.clone(),
//!         store,
//!     ));
//!     let relay = Relay::new(RelayConfig::default(), registry);
//!     relay.serve_websocket("0.0.0.0:3050").await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod registry;
pub mod relay;
pub mod session;

pub use error::{AuthError, RelayError, Result};
pub use registry::{Registry, Removed};
pub use relay::{Relay, RelayConfig};
pub use session::{AdminSession, ClientSession, ConnectionId, Identity};
