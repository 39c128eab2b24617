//! Fixed test values.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

/// Signing secret used by every test server.
pub const TEST_JWT_SECRET: &str = "session-test-signing-secret-0123456789";

/// OAuth client id the test config expects in `aud`.
pub const TEST_GOOGLE_CLIENT_ID: &str = "test-client.apps.googleusercontent.com";

/// Payment gateway key secret configured on test servers.
pub const TEST_PAYMENT_SECRET: &str = "test-gateway-key-secret";

/// Session cookie name used by test servers.
pub const TEST_COOKIE_NAME: &str = "nb_auth";

// Identities
pub const TEST_EMAIL_ASHA: &str = "asha@example.com";
pub const TEST_EMAIL_RAVI: &str = "ravi@example.com";

// User IDs that never exist in a fresh store
pub const TEST_UNKNOWN_USER: Uuid = Uuid::from_u128(100);

/// Gateway signature for `order_id|payment_id` under `secret`, as lowercase hex.
pub fn payment_signature(order_id: &str, payment_id: &str, secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
