//! Error types for Vantage

use thiserror::Error;

/// Result type alias for Vantage core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Vantage protocol error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid magic byte in frame header
    #[error("invalid magic byte: expected 0x56, got 0x{0:02x}")]
    InvalidMagic(u8),

    /// Frame version not understood by this build
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Frame payload exceeds the telemetry frame limit
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// Frame buffer too small
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    /// MessagePack encoding error
    #[error("encode error: {0}")]
    Encode(String),

    /// MessagePack decoding error
    #[error("decode error: {0}")]
    Decode(String),

    /// Session token signing or verification error
    #[error("token error: {0}")]
    Token(String),
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Encode(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Error::Token(e.to_string())
    }
}
