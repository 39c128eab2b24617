//! JWT helpers shared by the session issuer and its validators.
//!
//! Covers the parts of session-token handling that do not need the signing
//! key:
//! - the size ceiling applied before any parsing
//! - the fixed session lifetime
//! - unverified inspection of the compact form (segment split, header `alg`)
//!   used for early rejection
//!
//! Nothing here verifies a signature. Callers must still run the token
//! through the signing-key-backed codec before trusting any claim.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted session token size in bytes (8KB).
///
/// An HS256 session token with the subject id and plan claim is around 250
/// bytes. Anything past this limit is rejected before base64 decoding or
/// HMAC work happens.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Session token lifetime in seconds (7 days).
pub const SESSION_TTL_SECONDS: i64 = 604_800;

/// The only signing algorithm session tokens use.
pub const SESSION_ALGORITHM: &str = "HS256";

// =============================================================================
// Error Types
// =============================================================================

/// Errors from unverified token inspection.
///
/// Display text is generic on purpose; the variant carries the detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtShapeError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The session token is invalid")]
    TokenTooLarge,

    /// Not three base64url segments, or a segment is not the expected JSON.
    #[error("The session token is invalid")]
    MalformedToken,

    /// Header has no usable `alg` field.
    #[error("The session token is invalid")]
    MissingAlgorithm,
}

// =============================================================================
// Functions
// =============================================================================

/// Reject tokens over [`MAX_JWT_SIZE_BYTES`].
///
/// # Errors
///
/// Returns `JwtShapeError::TokenTooLarge` when the token is too long.
pub fn check_token_size(token: &str) -> Result<(), JwtShapeError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtShapeError::TokenTooLarge);
    }
    Ok(())
}

/// Split a compact JWT into `(header, payload, signature)` segments.
///
/// Size is checked first. Every segment must be non-empty.
///
/// # Errors
///
/// `TokenTooLarge` or `MalformedToken`.
pub fn split_compact(token: &str) -> Result<(&str, &str, &str), JwtShapeError> {
    check_token_size(token)?;

    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: not three segments");
        return Err(JwtShapeError::MalformedToken);
    };

    if header.is_empty() || payload.is_empty() || signature.is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty segment");
        return Err(JwtShapeError::MalformedToken);
    }

    Ok((header, payload, signature))
}

fn decode_segment(segment: &str) -> Result<serde_json::Value, JwtShapeError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
        JwtShapeError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
        JwtShapeError::MalformedToken
    })
}

/// Read the `alg` header field without verifying the token.
///
/// # Errors
///
/// `TokenTooLarge`, `MalformedToken`, or `MissingAlgorithm` when the header
/// has no non-empty string `alg`.
pub fn extract_alg(token: &str) -> Result<String, JwtShapeError> {
    let (header, _, _) = split_compact(token)?;
    let header = decode_segment(header)?;

    header
        .get("alg")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtShapeError::MissingAlgorithm)
}
