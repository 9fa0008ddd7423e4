// ============================
// ems-backend-lib/src/auth/session.rs
// ============================
//! Session token issuance and verification.
//!
//! Sessions are HS256 JWTs carrying the account identifier and role. Expiry
//! is checked against the injected [`Clock`] rather than the system time so
//! lifetimes can be tested. Logout adds the token's `jti` to an in-memory
//! deny-list until the token would have expired anyway.
use crate::clock::{checked_after, Clock};
use crate::metrics::{SESSION_ISSUED, SESSION_REVOKED};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ems_common::Role;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use metrics::counter;
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Session TTL (time to live)
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30); // 30 days

/// Size of a generated signing key in bytes
const SIGNING_KEY_BYTES: usize = 32;

/// Claims inside every session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account identifier
    pub sub: String,
    pub role: Role,
    /// Issued-at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Unique token id, used for revocation
    pub jti: String,
}

impl SessionClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// A freshly minted token and what it says
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claims: SessionClaims,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session token expired")]
    Expired,

    #[error("session token revoked")]
    Revoked,

    #[error("invalid session token")]
    Invalid,

    #[error("failed to sign session token: {0}")]
    Signing(String),

    #[error("session lifetime {0:?} does not fit a timestamp")]
    LifetimeOutOfRange(Duration),
}

/// Mints and checks session credentials
pub trait SessionIssuer: Send + Sync {
    /// Issue a token for an authenticated account
    fn issue(&self, identifier: &str, role: Role) -> Result<IssuedSession, SessionError>;

    /// Check signature, expiry and revocation of a token
    fn verify(&self, token: &str) -> Result<SessionClaims, SessionError>;

    /// Refuse this token from now until it expires
    fn revoke(&self, claims: &SessionClaims);

    /// Forget revocations of tokens that have expired since. Returns how many
    /// entries were dropped.
    fn purge_revoked(&self) -> usize;

    /// Lifetime of issued tokens
    fn ttl(&self) -> Duration;
}

/// Random key material for when no `session.secret` is configured
pub fn generate_signing_key() -> Vec<u8> {
    let mut key = vec![0u8; SIGNING_KEY_BYTES];
    OsRng.fill_bytes(&mut key);
    key
}

/// [`SessionIssuer`] producing HS256 JWTs
pub struct JwtSessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    revoked: DashMap<String, i64>,
}

impl JwtSessionIssuer {
    /// Create an issuer signing with the configured secret
    pub fn new(secret: &SecretString, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::from_key(secret.expose_secret().as_bytes(), ttl, clock)
    }

    /// Create an issuer with a key that only lives as long as this process
    pub fn with_ephemeral_key(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::from_key(&generate_signing_key(), ttl, clock)
    }

    fn from_key(key: &[u8], ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against `clock` in `verify`
        validation.validate_exp = false;
        validation.required_spec_claims = ["exp", "sub"].into_iter().map(String::from).collect();

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            ttl,
            clock,
            revoked: DashMap::new(),
        }
    }

    /// Number of currently revoked, unexpired tokens
    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }
}

impl SessionIssuer for JwtSessionIssuer {
    fn issue(&self, identifier: &str, role: Role) -> Result<IssuedSession, SessionError> {
        let now = self.clock.now();
        let expires =
            checked_after(now, self.ttl).ok_or(SessionError::LifetimeOutOfRange(self.ttl))?;
        let claims = SessionClaims {
            sub: identifier.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SessionError::Signing(e.to_string()))?;

        counter!(SESSION_ISSUED).increment(1);
        debug!(identifier, jti = %claims.jti, "session issued");
        Ok(IssuedSession { token, claims })
    }

    fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|_| SessionError::Invalid)?;
        let claims = data.claims;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(SessionError::Expired);
        }
        if self.revoked.contains_key(&claims.jti) {
            return Err(SessionError::Revoked);
        }
        Ok(claims)
    }

    fn revoke(&self, claims: &SessionClaims) {
        if claims.exp <= self.clock.now().timestamp() {
            return;
        }
        self.revoked.insert(claims.jti.clone(), claims.exp);
        counter!(SESSION_REVOKED).increment(1);
        debug!(identifier = %claims.sub, jti = %claims.jti, "session revoked");
    }

    fn purge_revoked(&self) -> usize {
        let now = self.clock.now().timestamp();
        let before = self.revoked.len();
        self.revoked.retain(|_, exp| *exp > now);
        before.saturating_sub(self.revoked.len())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
