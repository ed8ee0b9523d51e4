//! Authentication primitives
//!
//! Two credential kinds reach the relay:
//!
//! - **Client credential tokens** — long-lived, device-held. The gateway
//!   performs a liveness check only (non-empty token accepted as proof of
//!   identity); fine-grained access control is intentionally deferred to
//!   the credential issuing surface.
//! - **Admin session tokens** — short-lived HS256 JWTs carrying the
//!   principal name. Signature and expiry are verified on every
//!   authentication attempt.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::time;

/// Role claim value required in admin session tokens
const ADMIN_ROLE: &str = "admin";

/// Validates credentials for new connections.
///
/// Object-safe so the relay can be handed any gateway implementation
/// (production token verification, or a permissive stub in tests).
pub trait CredentialGateway: Send + Sync {
    /// Liveness check for a client credential token
    fn is_live_token(&self, token: &str) -> bool;

    /// Verify an admin session token and return the principal name
    fn decode_session_token(&self, token: &str) -> Option<String>;
}

/// Claims carried in an admin session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Principal name
    pub sub: String,
    pub role: String,
    /// Issued at (epoch seconds)
    pub iat: u64,
    /// Expiry (epoch seconds)
    pub exp: u64,
}

/// Default [`CredentialGateway`]: HS256 session tokens over a shared secret
pub struct TokenGateway {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenGateway {
    /// Create a gateway from a shared secret
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mint an admin session token for `principal`, valid for `ttl`
    pub fn issue_session_token(&self, principal: &str, ttl: Duration) -> Result<String> {
        let now = time::now_secs();
        let claims = SessionClaims {
            sub: principal.to_string(),
            role: ADMIN_ROLE.to_string(),
            iat: now,
            exp: now + ttl.as_secs(),
        };
        Ok(jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &self.encoding,
        )?)
    }
}

impl CredentialGateway for TokenGateway {
    fn is_live_token(&self, token: &str) -> bool {
        !token.trim().is_empty()
    }

    fn decode_session_token(&self, token: &str) -> Option<String> {
        let data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation).ok()?;
        (data.claims.role == ADMIN_ROLE).then(|| data.claims.sub)
    }
}

impl std::fmt::Debug for TokenGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGateway").finish_non_exhaustive()
    }
}
