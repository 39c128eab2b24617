//! Shared HMAC secret used to sign and verify session tokens.

use crate::config::ConfigError;
use common::secret::{is_blank, ExposeSecret, SecretBox, SecretString};

/// Recommended minimum HS256 key length (256 bits).
const RECOMMENDED_MIN_KEY_BYTES: usize = 32;

/// Immutable session signing key.
///
/// Built once at startup and shared behind an `Arc`. The bytes live in a
/// `SecretBox`, so `Debug` never prints them.
#[derive(Debug)]
pub struct SigningKey {
    key: SecretBox<[u8]>,
}

impl SigningKey {
    /// Build the key from the configured secret.
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingSigningKey` when the secret is empty or whitespace.
    pub fn from_secret(secret: &SecretString) -> Result<Self, ConfigError> {
        if is_blank(secret) {
            tracing::error!(target: "session.auth.signing_key", "Session signing secret is not configured");
            return Err(ConfigError::MissingSigningKey);
        }

        let bytes = secret.expose_secret().as_bytes();
        if bytes.len() < RECOMMENDED_MIN_KEY_BYTES {
            tracing::warn!(
                target: "session.auth.signing_key",
                key_len = bytes.len(),
                recommended = RECOMMENDED_MIN_KEY_BYTES,
                "Session signing secret is shorter than recommended for HS256"
            );
        }

        Ok(Self {
            key: SecretBox::new(bytes.to_vec().into_boxed_slice()),
        })
    }

    /// Raw key material for HMAC.
    pub fn get_key(&self) -> &[u8] {
        self.key.expose_secret()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_secret_exposes_bytes() {
        let key = SigningKey::from_secret(&SecretString::from("0123456789abcdef0123456789abcdef"))
            .unwrap();
        assert_eq!(key.get_key(), b"0123456789abcdef0123456789abcdef");
    }

    #[test]
    fn test_blank_secret_is_rejected() {
        for blank in ["", " ", "\n\t"] {
            let result = SigningKey::from_secret(&SecretString::from(blank));
            assert!(matches!(result, Err(ConfigError::MissingSigningKey)));
        }
    }

    #[test]
    fn test_short_secret_is_accepted() {
        let key = SigningKey::from_secret(&SecretString::from("short")).unwrap();
        assert_eq!(key.get_key().len(), 5);
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let key = SigningKey::from_secret(&SecretString::from("super-secret-signing-key-material"))
            .unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains("super-secret"));
    }
}
