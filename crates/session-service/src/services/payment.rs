//! Payment confirmation and plan upgrade.
//!
//! The payment gateway signs `"{order_id}|{payment_id}"` with HMAC-SHA256
//! under the merchant key secret and sends the lowercase hex digest back
//! through the client. A matching signature upgrades the caller to PREMIUM
//! and a fresh session token is issued so the embedded tier is current.

use crate::auth::codec::{CodecError, SessionCodec};
use crate::models::{PlanTier, User, UserId};
use crate::observability::metrics::{record_credential_issued, record_plan_upgrade};
use crate::repositories::{UserStore, UserStoreError};
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretString};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::instrument;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("User not found")]
    UserNotFound,

    #[error("User store error: {0}")]
    Store(#[from] UserStoreError),

    #[error("Token issuance failed: {0}")]
    Codec(#[from] CodecError),
}

fn mac_for(order_id: &str, payment_id: &str, key_secret: &SecretString) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key_secret.expose_secret().as_bytes()).ok()?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Some(mac)
}

/// Hex HMAC-SHA256 the gateway is expected to send for this order/payment.
pub fn expected_signature(
    order_id: &str,
    payment_id: &str,
    key_secret: &SecretString,
) -> Option<String> {
    mac_for(order_id, payment_id, key_secret).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

/// Check a gateway signature in constant time.
///
/// Non-hex input is simply a mismatch.
pub fn verify_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    key_secret: &SecretString,
) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };

    mac_for(order_id, payment_id, key_secret)
        .map(|mac| mac.verify_slice(&provided).is_ok())
        .unwrap_or(false)
}

/// Upgrade `user_id` to PREMIUM and issue a token carrying the new tier.
///
/// # Errors
///
/// `UserNotFound` if the user vanished, `Store` or `Codec` otherwise.
#[instrument(skip_all, name = "session.services.payment.upgrade")]
pub async fn upgrade_to_premium(
    store: &dyn UserStore,
    codec: &SessionCodec,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<(User, String), UpgradeError> {
    let user = match store.update_plan(user_id, PlanTier::Premium).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            record_plan_upgrade("error");
            return Err(UpgradeError::UserNotFound);
        }
        Err(e) => {
            record_plan_upgrade("error");
            return Err(e.into());
        }
    };

    let token = match codec.encode(user.id, user.plan, now) {
        Ok(token) => token,
        Err(e) => {
            record_plan_upgrade("error");
            return Err(e.into());
        }
    };
    record_plan_upgrade("success");
    record_credential_issued("plan_upgrade");

    tracing::info!(target: "session.services.payment", "User upgraded to PREMIUM");
    Ok((user, token))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::signing_key::SigningKey;
    use crate::models::VerifiedIdentity;
    use crate::repositories::InMemoryUserStore;
    use std::sync::Arc;

    fn key() -> SecretString {
        SecretString::from("gateway-key-secret")
    }

    #[test]
    fn test_expected_signature_is_lowercase_hex() {
        let sig = expected_signature("order_1", "pay_1", &key()).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(verify_signature("order_1", "pay_1", &sig, &key()));
    }

    #[test]
    fn test_verify_signature_rejects_mismatch() {
        let sig = expected_signature("order_1", "pay_1", &key()).unwrap();

        assert!(!verify_signature("order_2", "pay_1", &sig, &key()));
        assert!(!verify_signature("order_1", "pay_2", &sig, &key()));
        assert!(!verify_signature(
            "order_1",
            "pay_1",
            &sig,
            &SecretString::from("other-secret")
        ));
    }

    #[test]
    fn test_verify_signature_separator_matters() {
        let sig = expected_signature("a", "b", &key()).unwrap();
        assert!(!verify_signature("ab", "", &sig, &key()));
    }

    #[test]
    fn test_verify_signature_accepts_uppercase_hex() {
        let sig = expected_signature("order_1", "pay_1", &key())
            .unwrap()
            .to_uppercase();
        assert!(verify_signature("order_1", "pay_1", &sig, &key()));
    }

    #[test]
    fn test_verify_signature_rejects_garbage() {
        assert!(!verify_signature("order_1", "pay_1", "", &key()));
        assert!(!verify_signature("order_1", "pay_1", "zz-not-hex", &key()));
        assert!(!verify_signature("order_1", "pay_1", "abcd", &key()));
    }

    #[tokio::test]
    async fn test_upgrade_to_premium_reissues_token() {
        let store = InMemoryUserStore::new();
        let codec = SessionCodec::new(Arc::new(
            SigningKey::from_secret(&SecretString::from("payment-test-secret-0123456789ab"))
                .unwrap(),
        ));
        let user = store
            .save(User::from_identity(
                &VerifiedIdentity {
                    identity_key: "buyer@example.com".to_string(),
                    display_name: "Buyer".to_string(),
                    picture_url: None,
                },
                Utc::now(),
            ))
            .await
            .unwrap();
        let now = Utc::now();

        let (upgraded, token) = upgrade_to_premium(&store, &codec, user.id, now)
            .await
            .unwrap();

        assert_eq!(upgraded.plan, PlanTier::Premium);
        assert_eq!(codec.decode_at(&token, now).unwrap().plan, PlanTier::Premium);
        assert_eq!(
            store.find_by_id(user.id).await.unwrap().unwrap().plan,
            PlanTier::Premium
        );
    }

    #[tokio::test]
    async fn test_upgrade_unknown_user() {
        let store = InMemoryUserStore::new();
        let codec = SessionCodec::new(Arc::new(
            SigningKey::from_secret(&SecretString::from("payment-test-secret-0123456789ab"))
                .unwrap(),
        ));

        let result = upgrade_to_premium(&store, &codec, UserId::new(), Utc::now()).await;
        assert!(matches!(result, Err(UpgradeError::UserNotFound)));
    }
}
