//! Identity exchange: verified external identity in, session token out.

use crate::auth::codec::{CodecError, SessionCodec};
use crate::models::{User, VerifiedIdentity};
use crate::observability::metrics::{record_credential_issued, record_identity_exchange};
use crate::repositories::{UserStore, UserStoreError};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("User store error: {0}")]
    Store(#[from] UserStoreError),

    #[error("Token issuance failed: {0}")]
    Codec(#[from] CodecError),
}

/// Resolve or create the local user for `identity` and issue a session token.
///
/// # Steps
///
/// 1. Look up the user by identity key
/// 2. If absent, create a FREE user from the identity profile
/// 3. On an insert conflict (a concurrent exchange won), fetch once more
/// 4. Encode a token with the user's current id and tier at `now`
///
/// An existing user's stored profile is returned as-is; the identity's
/// name and picture are only used when the user is created.
///
/// # Errors
///
/// `Store` for user store failures, `Codec` if signing fails.
#[instrument(skip_all, name = "session.services.identity_exchange")]
pub async fn exchange(
    store: &dyn UserStore,
    codec: &SessionCodec,
    identity: &VerifiedIdentity,
    now: DateTime<Utc>,
) -> Result<(User, String), ExchangeError> {
    let (user, resolution) = match resolve_or_create(store, identity, now).await {
        Ok(resolved) => resolved,
        Err(e) => {
            record_identity_exchange("error");
            return Err(e.into());
        }
    };

    let token = match codec.encode(user.id, user.plan, now) {
        Ok(token) => token,
        Err(e) => {
            record_identity_exchange("error");
            return Err(e.into());
        }
    };
    record_identity_exchange(resolution.as_str());
    record_credential_issued("login");

    tracing::debug!(target: "session.services.identity_exchange", plan = %user.plan, "Session token issued");
    Ok((user, token))
}

/// How the local user for an identity was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Existing,
    Created,
    ConflictResolved,
}

impl Resolution {
    fn as_str(self) -> &'static str {
        match self {
            Resolution::Existing => "existing",
            Resolution::Created => "created",
            Resolution::ConflictResolved => "conflict_resolved",
        }
    }
}

async fn resolve_or_create(
    store: &dyn UserStore,
    identity: &VerifiedIdentity,
    now: DateTime<Utc>,
) -> Result<(User, Resolution), UserStoreError> {
    if let Some(existing) = store.find_by_identity_key(&identity.identity_key).await? {
        return Ok((existing, Resolution::Existing));
    }

    match store.save(User::from_identity(identity, now)).await {
        Ok(created) => {
            tracing::info!(target: "session.services.identity_exchange", "Created new user");
            Ok((created, Resolution::Created))
        }
        Err(UserStoreError::Conflict) => {
            tracing::debug!(
                target: "session.services.identity_exchange",
                "Concurrent create detected, fetching existing user"
            );
            let existing = store
                .find_by_identity_key(&identity.identity_key)
                .await?
                .ok_or(UserStoreError::Conflict)?;
            Ok((existing, Resolution::ConflictResolved))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::signing_key::SigningKey;
    use crate::models::{PlanTier, UserId};
    use crate::repositories::InMemoryUserStore;
    use common::secret::SecretString;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn codec() -> SessionCodec {
        SessionCodec::new(Arc::new(
            SigningKey::from_secret(&SecretString::from("exchange-test-secret-0123456789abc"))
                .unwrap(),
        ))
    }

    fn identity(email: &str, name: &str) -> VerifiedIdentity {
        VerifiedIdentity {
            identity_key: email.to_string(),
            display_name: name.to_string(),
            picture_url: Some(format!("https://img.example.com/{name}.png")),
        }
    }

    #[tokio::test]
    async fn test_first_exchange_creates_free_user() {
        let store = InMemoryUserStore::new();
        let codec = codec();
        let now = Utc::now();

        let (user, token) = exchange(&store, &codec, &identity("new@example.com", "New"), now)
            .await
            .unwrap();

        assert_eq!(user.plan, PlanTier::Free);
        assert_eq!(user.display_name, "New");
        assert_eq!(store.len().await, 1);

        let claims = codec.decode_at(&token, now).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.plan, PlanTier::Free);
        assert_eq!(claims.iat, now.timestamp());
    }

    #[tokio::test]
    async fn test_repeat_exchange_reuses_user_and_keeps_profile() {
        let store = InMemoryUserStore::new();
        let codec = codec();

        let (first, _) = exchange(&store, &codec, &identity("a@example.com", "Original"), Utc::now())
            .await
            .unwrap();
        let (second, _) = exchange(&store, &codec, &identity("a@example.com", "Changed"), Utc::now())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name, "Original");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_exchange_embeds_current_tier() {
        let store = InMemoryUserStore::new();
        let codec = codec();
        let now = Utc::now();

        let (user, _) = exchange(&store, &codec, &identity("p@example.com", "P"), now)
            .await
            .unwrap();
        store.update_plan(user.id, PlanTier::Premium).await.unwrap();

        let (_, token) = exchange(&store, &codec, &identity("p@example.com", "P"), now)
            .await
            .unwrap();
        assert_eq!(codec.decode_at(&token, now).unwrap().plan, PlanTier::Premium);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_exchanges_create_one_user() {
        let store = Arc::new(InMemoryUserStore::new());
        let codec = codec();
        let now = Utc::now();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                let codec = codec.clone();
                tokio::spawn(async move {
                    exchange(store.as_ref(), &codec, &identity("race@example.com", "Race"), now)
                        .await
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            let (user, _) = handle.await.unwrap().unwrap();
            ids.insert(user.id);
        }

        assert_eq!(ids.len(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = InMemoryUserStore::new();
        store.set_available(false);

        let result = exchange(&store, &codec(), &identity("x@example.com", "X"), Utc::now()).await;
        assert!(matches!(
            result,
            Err(ExchangeError::Store(UserStoreError::Database(_)))
        ));
    }

    #[tokio::test]
    async fn test_conflict_then_fetch() {
        // A store that reports a conflict on insert after another writer
        // already created the user.
        struct RacingStore {
            inner: InMemoryUserStore,
            winner: User,
        }

        #[async_trait::async_trait]
        impl UserStore for RacingStore {
            async fn find_by_identity_key(
                &self,
                key: &str,
            ) -> Result<Option<User>, UserStoreError> {
                self.inner.find_by_identity_key(key).await
            }
            async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError> {
                self.inner.find_by_id(id).await
            }
            async fn save(&self, _user: User) -> Result<User, UserStoreError> {
                self.inner.save(self.winner.clone()).await?;
                Err(UserStoreError::Conflict)
            }
            async fn update_plan(
                &self,
                id: UserId,
                plan: PlanTier,
            ) -> Result<Option<User>, UserStoreError> {
                self.inner.update_plan(id, plan).await
            }
            async fn ping(&self) -> Result<(), UserStoreError> {
                Ok(())
            }
        }

        let id = identity("late@example.com", "Late");
        let winner = User::from_identity(&id, Utc::now());
        let store = RacingStore {
            inner: InMemoryUserStore::new(),
            winner: winner.clone(),
        };

        let (user, _) = exchange(&store, &codec(), &id, Utc::now()).await.unwrap();
        assert_eq!(user.id, winner.id);
    }

    fn exchanges(
        snapshot: &[(
            metrics_util::CompositeKey,
            Option<metrics::Unit>,
            Option<metrics::SharedString>,
            DebugValue,
        )],
        result: &str,
    ) -> u64 {
        snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == "session_identity_exchanges_total")
            .filter(|(key, _, _, _)| {
                key.key()
                    .labels()
                    .any(|l| l.key() == "result" && l.value() == result)
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(n) => *n,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_exchange_results_are_counted_once_issued() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            runtime.block_on(async {
                let store = InMemoryUserStore::new();
                let codec = codec();
                let who = identity("count@example.com", "Count");

                exchange(&store, &codec, &who, Utc::now()).await.unwrap();
                exchange(&store, &codec, &who, Utc::now()).await.unwrap();

                store.set_available(false);
                assert!(exchange(&store, &codec, &who, Utc::now()).await.is_err());
            });
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(exchanges(&snapshot, "created"), 1);
        assert_eq!(exchanges(&snapshot, "existing"), 1);
        assert_eq!(exchanges(&snapshot, "error"), 1);
    }
}
