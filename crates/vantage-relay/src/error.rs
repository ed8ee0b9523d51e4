//! Relay error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Why an authentication attempt was rejected.
///
/// The message carried in the resulting `auth-error` event is this error's
/// display form; it deliberately never says which part of a token was wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credential token")]
    InvalidCredential,

    #[error("invalid or expired session token")]
    InvalidSession,

    #[error("session limit reached")]
    SessionLimit,
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] vantage_transport::TransportError),

    #[error("protocol error: {0}")]
    Core(#[from] vantage_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
