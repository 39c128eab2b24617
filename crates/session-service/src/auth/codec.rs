//! HS256 session token codec.
//!
//! # Security
//!
//! - Tokens are size-checked before parsing
//! - Only HS256 is accepted; `alg=none` and asymmetric algorithms are malformed
//! - Signature is verified before any claim is trusted
//! - Expiry uses `now >= exp` with no leeway

use crate::auth::claims::SessionClaims;
use crate::auth::signing_key::SigningKey;
use chrono::{DateTime, Utc};
use common::jwt::{check_token_size, extract_alg, SESSION_ALGORITHM, SESSION_TTL_SECONDS};
use common::types::{PlanTier, UserId};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Why a presented session token was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    #[error("The session token has expired")]
    Expired,

    #[error("The session token is invalid")]
    Malformed,

    #[error("The session token is invalid")]
    InvalidSignature,
}

impl CredentialError {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialError::Expired => "expired",
            CredentialError::Malformed => "malformed",
            CredentialError::InvalidSignature => "invalid_signature",
        }
    }
}

/// Token issuance failure.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to sign session token: {0}")]
    Signing(String),
}

/// Encodes and decodes session tokens with the shared signing key.
#[derive(Debug, Clone)]
pub struct SessionCodec {
    key: Arc<SigningKey>,
}

impl SessionCodec {
    pub fn new(key: Arc<SigningKey>) -> Self {
        Self { key }
    }

    /// Issue a token for `subject` at `now`, expiring seven days later.
    ///
    /// # Errors
    ///
    /// `CodecError::Signing` if the JWT library fails to sign.
    #[instrument(skip_all, name = "session.codec.encode")]
    pub fn encode(
        &self,
        subject: UserId,
        plan: PlanTier,
        now: DateTime<Utc>,
    ) -> Result<String, CodecError> {
        let iat = now.timestamp();
        let claims = SessionClaims {
            sub: subject.to_string(),
            plan,
            iat,
            exp: iat + SESSION_TTL_SECONDS,
        };

        // Header::new sets typ=JWT
        let header = Header::new(Algorithm::HS256);

        encode(&header, &claims, &EncodingKey::from_secret(self.key.get_key())).map_err(|e| {
            tracing::error!(target: "session.auth.codec", error = %e, "Failed to sign session token");
            CodecError::Signing(e.to_string())
        })
    }

    /// Decode and validate a token against the wall clock.
    ///
    /// # Errors
    ///
    /// See [`SessionCodec::decode_at`].
    pub fn decode(&self, token: &str) -> Result<SessionClaims, CredentialError> {
        self.decode_at(token, Utc::now())
    }

    /// Decode and validate a token as of `now`.
    ///
    /// Checks run in order: size, structure and algorithm, signature, claim
    /// shape, expiry. So `Expired` is only ever reported for a token that
    /// carries a valid signature.
    ///
    /// # Errors
    ///
    /// - `Malformed` - oversized, not a compact JWT, not HS256, bad claims
    /// - `InvalidSignature` - HMAC does not match the signing key
    /// - `Expired` - `now >= exp`
    #[instrument(skip_all, name = "session.codec.decode")]
    pub fn decode_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, CredentialError> {
        check_token_size(token).map_err(|e| {
            tracing::debug!(target: "session.auth.codec", error = ?e, "Token rejected before parsing");
            CredentialError::Malformed
        })?;

        let alg = extract_alg(token).map_err(|e| {
            tracing::debug!(target: "session.auth.codec", error = ?e, "Token header unreadable");
            CredentialError::Malformed
        })?;
        if alg != SESSION_ALGORITHM {
            tracing::debug!(target: "session.auth.codec", alg = %alg, "Unexpected token algorithm");
            return Err(CredentialError::Malformed);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock, without leeway.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        let claims = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.key.get_key()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => {
                tracing::debug!(target: "session.auth.codec", "Token signature mismatch");
                CredentialError::InvalidSignature
            }
            _ => {
                tracing::debug!(target: "session.auth.codec", error = %e, "Token could not be decoded");
                CredentialError::Malformed
            }
        })?;

        if claims.sub.trim().is_empty() || claims.exp <= claims.iat {
            tracing::debug!(target: "session.auth.codec", "Token claims are inconsistent");
            return Err(CredentialError::Malformed);
        }

        if now.timestamp() >= claims.exp {
            return Err(CredentialError::Expired);
        }

        Ok(claims)
    }
}
