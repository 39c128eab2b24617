//! Google ID token verification.
//!
//! The verifier asks Google's `tokeninfo` endpoint to validate the token
//! and then checks the fields we depend on ourselves. Any failure collapses
//! to one opaque [`VerificationError`]; the cause is only logged.

use crate::models::VerifiedIdentity;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, instrument, warn};

/// Request timeout for tokeninfo calls in seconds.
const GOOGLE_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Issuers Google uses for ID tokens.
const GOOGLE_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

/// External identity assertion was not accepted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Identity verification failed")]
pub struct VerificationError;

/// The verifier could not be constructed at startup.
#[derive(Debug, Error)]
pub enum VerifierInitError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Verifies an external identity assertion.
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `assertion` and return the identity it proves.
    async fn verify(&self, assertion: &str) -> Result<VerifiedIdentity, VerificationError>;
}

/// Fields of the tokeninfo response we use. Google returns most values as
/// strings, so `email_verified` and `exp` accept either form.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    iss: Option<String>,
    email: Option<String>,
    email_verified: Option<serde_json::Value>,
    exp: Option<serde_json::Value>,
    name: Option<String>,
    picture: Option<String>,
}

fn as_bool(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s == "true",
        _ => false,
    }
}

fn as_i64(value: Option<&serde_json::Value>) -> Option<i64> {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

/// Verifier backed by Google's tokeninfo endpoint.
#[derive(Clone)]
pub struct GoogleIdTokenVerifier {
    client: Client,
    tokeninfo_url: String,
    client_id: String,
}

impl GoogleIdTokenVerifier {
    /// Create a verifier that accepts tokens issued for `client_id`.
    ///
    /// # Errors
    ///
    /// Returns `VerifierInitError::HttpClient` if the HTTP client cannot be built.
    pub fn new(tokeninfo_url: String, client_id: String) -> Result<Self, VerifierInitError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(GOOGLE_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "session.auth.google", error = %e, "Failed to build HTTP client");
                VerifierInitError::HttpClient(e.to_string())
            })?;

        Ok(Self {
            client,
            tokeninfo_url,
            client_id,
        })
    }

    fn check(&self, info: TokenInfo) -> Result<VerifiedIdentity, &'static str> {
        if info.aud.as_deref() != Some(self.client_id.as_str()) {
            return Err("audience mismatch");
        }

        match info.iss.as_deref() {
            Some(iss) if GOOGLE_ISSUERS.contains(&iss) => {}
            _ => return Err("unexpected issuer"),
        }

        let exp = as_i64(info.exp.as_ref()).ok_or("missing expiry")?;
        if exp <= Utc::now().timestamp() {
            return Err("token expired");
        }

        if !as_bool(info.email_verified.as_ref()) {
            return Err("email not verified");
        }

        let email = info
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or("missing email")?;

        let display_name = info
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.clone());

        Ok(VerifiedIdentity {
            identity_key: email,
            display_name,
            picture_url: info.picture.filter(|p| !p.is_empty()),
        })
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for GoogleIdTokenVerifier {
    #[instrument(skip_all, name = "session.auth.google.verify")]
    async fn verify(&self, assertion: &str) -> Result<VerifiedIdentity, VerificationError> {
        if assertion.trim().is_empty() {
            warn!(target: "session.auth.google", "Empty identity assertion");
            return Err(VerificationError);
        }
        if self.client_id.trim().is_empty() {
            error!(target: "session.auth.google", "Google client id is not configured");
            return Err(VerificationError);
        }

        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", assertion)])
            .send()
            .await
            .map_err(|e| {
                warn!(target: "session.auth.google", error = %e, "Tokeninfo request failed");
                VerificationError
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "session.auth.google", status = %status, "Tokeninfo rejected the token");
            return Err(VerificationError);
        }

        let info: TokenInfo = response.json().await.map_err(|e| {
            warn!(target: "session.auth.google", error = %e, "Failed to parse tokeninfo response");
            VerificationError
        })?;

        self.check(info).map_err(|reason| {
            warn!(target: "session.auth.google", reason, "Google ID token rejected");
            VerificationError
        })
    }
}

/// Mock identity verifier for testing.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Mode {
        /// Treat the assertion itself as the verified email.
        EmailAssertions,
        /// Accept only the listed assertions.
        Fixed(HashMap<String, VerifiedIdentity>),
        /// Reject everything.
        Rejecting,
    }

    /// Mock verifier that never makes network calls.
    pub struct MockIdentityVerifier {
        mode: Mode,
        call_count: AtomicUsize,
    }

    impl MockIdentityVerifier {
        /// Accept any non-empty assertion, using it as the email. The
        /// display name is the part before `@`.
        pub fn accepting() -> Self {
            Self {
                mode: Mode::EmailAssertions,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Accept only the given assertion to identity mappings.
        pub fn with_identities(identities: HashMap<String, VerifiedIdentity>) -> Self {
            Self {
                mode: Mode::Fixed(identities),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Reject every assertion.
        pub fn rejecting() -> Self {
            Self {
                mode: Mode::Rejecting,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl IdentityVerifier for MockIdentityVerifier {
        async fn verify(&self, assertion: &str) -> Result<VerifiedIdentity, VerificationError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if assertion.trim().is_empty() {
                return Err(VerificationError);
            }

            match &self.mode {
                Mode::EmailAssertions => {
                    let display_name = assertion
                        .split('@')
                        .next()
                        .unwrap_or(assertion)
                        .to_string();
                    Ok(VerifiedIdentity {
                        identity_key: assertion.to_string(),
                        display_name,
                        picture_url: None,
                    })
                }
                Mode::Fixed(identities) => {
                    identities.get(assertion).cloned().ok_or(VerificationError)
                }
                Mode::Rejecting => Err(VerificationError),
            }
        }
    }

}
