//! Secret wrappers for values that must never reach a log line.
//!
//! Re-exports the [`secrecy`] types used by Nutrebirth services for the
//! session signing secret and the payment gateway key secret. Both types
//! print a redacted placeholder from `Debug`, so a config struct that
//! derives `Debug` stays safe to log.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct GatewaySettings {
//!     key_id: String,
//!     key_secret: SecretString,
//! }
//!
//! let settings = GatewaySettings {
//!     key_id: "rzp_test_key".to_string(),
//!     key_secret: SecretString::from("gateway-secret"),
//! };
//!
//! assert!(!format!("{settings:?}").contains("gateway-secret"));
//! assert_eq!(settings.key_secret.expose_secret(), "gateway-secret");
//! ```
//!
//! Binary key material (HMAC keys) goes in `SecretBox<[u8]>`.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

/// Returns true when the secret is absent in practice: empty or whitespace only.
#[must_use]
pub fn is_blank(secret: &SecretString) -> bool {
    secret.expose_secret().trim().is_empty()
}
