//! Builders for session tokens the service did or did not issue.
//!
//! Tokens come out exactly as specified, so tests can produce expired,
//! mis-signed or oddly-shaped tokens that the real codec refuses to create.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use common::jwt::SESSION_TTL_SECONDS;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::fixtures::TEST_JWT_SECRET;

/// Builder for raw session tokens.
///
/// # Example
/// ```rust,ignore
/// let expired = TestTokenBuilder::new()
///     .for_user(user_id)
///     .issued_at(Utc::now() - Duration::days(8))
///     .build();
/// ```
pub struct TestTokenBuilder {
    sub: String,
    plan: String,
    iat: i64,
    exp: i64,
    algorithm: Algorithm,
    secret: String,
}

impl TestTokenBuilder {
    /// FREE token for a random subject, issued now, signed with the test secret.
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: Uuid::new_v4().to_string(),
            plan: "FREE".to_string(),
            iat: now,
            exp: now + SESSION_TTL_SECONDS,
            algorithm: Algorithm::HS256,
            secret: TEST_JWT_SECRET.to_string(),
        }
    }

    /// Set the subject from a user id.
    pub fn for_user(mut self, id: Uuid) -> Self {
        self.sub = id.to_string();
        self
    }

    /// Set the raw `sub` claim.
    pub fn with_subject(mut self, sub: &str) -> Self {
        self.sub = sub.to_string();
        self
    }

    /// Set the raw `plan` claim.
    pub fn with_plan(mut self, plan: &str) -> Self {
        self.plan = plan.to_string();
        self
    }

    /// Issue at `at`, expiring one session lifetime later.
    pub fn issued_at(mut self, at: DateTime<Utc>) -> Self {
        self.iat = at.timestamp();
        self.exp = self.iat + SESSION_TTL_SECONDS;
        self
    }

    /// Override the expiry relative to `iat`.
    pub fn expires_after(mut self, lifetime: Duration) -> Self {
        self.exp = self.iat + lifetime.num_seconds();
        self
    }

    /// Sign with a different secret.
    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    /// Sign with a different HMAC algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// The claims as JSON.
    pub fn claims(&self) -> Value {
        json!({
            "sub": self.sub,
            "plan": self.plan,
            "iat": self.iat,
            "exp": self.exp,
        })
    }

    /// Encode and sign.
    pub fn build(self) -> String {
        encode(
            &Header::new(self.algorithm),
            &self.claims(),
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("HMAC signing of JSON claims cannot fail")
    }

    /// Encode with `alg: none` and an empty signature.
    pub fn build_unsigned(self) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(self.claims().to_string());
        format!("{header}.{payload}.")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Flip one character of the signature segment.
pub fn tamper_signature(token: &str) -> String {
    let (rest, signature) = token.rsplit_once('.').expect("token has three segments");
    let mut chars: Vec<char> = signature.chars().collect();
    let first = chars.first_mut().expect("signature is not empty");
    *first = if *first == 'A' { 'B' } else { 'A' };
    format!("{rest}.{}", chars.into_iter().collect::<String>())
}

/// Replace the payload with `claims`, keeping the original header and signature.
pub fn swap_payload(token: &str, claims: &Value) -> String {
    let mut parts = token.split('.');
    let header = parts.next().expect("header segment");
    let _payload = parts.next().expect("payload segment");
    let signature = parts.next().expect("signature segment");
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.{signature}")
}
