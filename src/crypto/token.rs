use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, CredentialError, Result};

/// The `iss` claim carried by every credential this server signs.
pub const ISSUER: &str = "CVmaker-Server";

/// Claims of a session credential. Immutable once signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated user.
    pub user_id: i64,
    /// Session identifier; names the ledger row this credential belongs to.
    pub jti: Uuid,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expires-at, seconds since the epoch.
    pub exp: i64,
    pub iss: String,
}

/// A freshly signed credential and the claims inside it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Issues and validates HS256-signed session credentials.
///
/// The key and TTL are fixed at construction; nothing here mutates after
/// startup.
#[derive(Clone)]
pub struct CredentialIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    validation: Validation,
}

impl CredentialIssuer {
    /// Creates a new `CredentialIssuer`.
    ///
    /// # Arguments
    ///
    /// * `secret` - The HMAC signing key.
    /// * `ttl` - How long an issued credential stays valid.
    pub fn new(secret: &[u8], ttl: std::time::Duration) -> Result<Self> {
        let ttl = Duration::from_std(ttl)
            .map_err(|e| AppError::Internal(format!("Token TTL out of range: {}", e)))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            validation,
        })
    }

    /// The lifetime of issued credentials, for cookie max-age.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a credential for `user_id` with a fresh session id.
    pub fn issue(&self, user_id: i64) -> Result<IssuedToken> {
        self.issue_at(user_id, Uuid::new_v4(), Utc::now())
    }

    pub(crate) fn issue_at(&self, user_id: i64, jti: Uuid, now: DateTime<Utc>) -> Result<IssuedToken> {
        let claims = Claims {
            user_id,
            jti,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            iss: ISSUER.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Signing(e.to_string()))?;

        tracing::debug!("🔑 Issued credential {} for user {}", jti, user_id);
        Ok(IssuedToken { token, claims })
    }

    /// Verifies the signature and expiry of `token` and returns its claims.
    pub fn validate(&self, token: &str) -> std::result::Result<Claims, CredentialError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => CredentialError::InvalidSignature,
                ErrorKind::ExpiredSignature => CredentialError::Expired,
                _ => CredentialError::Malformed,
            }
        })?;

        // The decoder accepts exp == now; a credential is dead at its expiry second.
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(CredentialError::Expired);
        }

        Ok(data.claims)
    }
}
