//! Bearer tokens. Verification is the trusted step that precedes claims
//! extraction; issuing happens on a successful password login.

use fieldscout_core::{AuthContext, Claims, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;

pub const DEFAULT_TTL_SECS: u64 = 8 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::Rejected(_) => ErrorKind::Unauthenticated,
            TokenError::Signing(_) => ErrorKind::Internal,
        }
    }
}

pub trait TokenVerifier: Send + Sync {
    /// Checks signature and expiry, returning the payload for claims
    /// extraction.
    fn verify(&self, token: &str) -> Result<Value, TokenError>;
}

pub struct Hs256Verifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256Verifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl TokenVerifier for Hs256Verifier {
    fn verify(&self, token: &str) -> Result<Value, TokenError> {
        jsonwebtoken::decode::<Value>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Rejected(e.to_string()))
    }
}

pub struct TokenIssuer {
    key: EncodingKey,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    pub fn issue(&self, ctx: &AuthContext) -> Result<String, TokenError> {
        let claims = Claims::new(ctx, jsonwebtoken::get_current_timestamp(), self.ttl_secs);
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}
