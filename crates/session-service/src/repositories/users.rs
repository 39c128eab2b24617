//! User store.
//!
//! The `UserStore` trait is the only shared mutable resource in the
//! service. Identity-key uniqueness is enforced by the store itself: a
//! unique constraint in Postgres, a single lock in memory.

use crate::models::{PlanTier, User, UserId};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Name of the unique constraint on `users.email`.
const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_unique";

#[derive(Debug, Error)]
pub enum UserStoreError {
    /// Another user already owns this identity key.
    #[error("A user with this identity key already exists")]
    Conflict,

    #[error("User store error: {0}")]
    Database(String),
}

/// Persistence for users.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_identity_key(&self, identity_key: &str)
        -> Result<Option<User>, UserStoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError>;

    /// Insert or update keyed on `user.id`. Returns the stored record.
    ///
    /// Fails with `Conflict` if a different user holds the identity key.
    async fn save(&self, user: User) -> Result<User, UserStoreError>;

    /// Set the plan tier. `None` when the user does not exist.
    async fn update_plan(&self, id: UserId, plan: PlanTier)
        -> Result<Option<User>, UserStoreError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), UserStoreError>;
}

// ============================================================================
// Postgres
// ============================================================================

/// Row in the `users` table.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    display_name: String,
    picture_url: Option<String>,
    plan: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = UserStoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let plan = row
            .plan
            .parse::<PlanTier>()
            .map_err(|e| UserStoreError::Database(e.to_string()))?;

        Ok(User {
            id: UserId(row.user_id),
            identity_key: row.email,
            display_name: row.display_name,
            picture_url: row.picture_url,
            plan,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `UserStore` over a Postgres pool.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn find_by_identity_key(
        &self,
        identity_key: &str,
    ) -> Result<Option<User>, UserStoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, email, display_name, picture_url, plan, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(identity_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserStoreError::Database(format!("Failed to fetch user by email: {}", e)))?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, email, display_name, picture_url, plan, created_at, updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserStoreError::Database(format!("Failed to fetch user by id: {}", e)))?;

        row.map(User::try_from).transpose()
    }

    async fn save(&self, user: User) -> Result<User, UserStoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (user_id, email, display_name, picture_url, plan, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                picture_url = EXCLUDED.picture_url,
                plan = EXCLUDED.plan,
                updated_at = EXCLUDED.updated_at
            RETURNING user_id, email, display_name, picture_url, plan, created_at, updated_at
            "#,
        )
        .bind(user.id.0)
        .bind(&user.identity_key)
        .bind(&user.display_name)
        .bind(&user.picture_url)
        .bind(user.plan.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains(EMAIL_UNIQUE_CONSTRAINT) {
                UserStoreError::Conflict
            } else {
                UserStoreError::Database(format!("Failed to save user: {}", e))
            }
        })?;

        User::try_from(row)
    }

    async fn update_plan(
        &self,
        id: UserId,
        plan: PlanTier,
    ) -> Result<Option<User>, UserStoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET plan = $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING user_id, email, display_name, picture_url, plan, created_at, updated_at
            "#,
        )
        .bind(id.0)
        .bind(plan.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserStoreError::Database(format!("Failed to update plan: {}", e)))?;

        row.map(User::try_from).transpose()
    }

    async fn ping(&self) -> Result<(), UserStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| UserStoreError::Database(format!("Database ping failed: {}", e)))
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// `UserStore` kept in process memory.
///
/// Used by tests and local runs. `set_available(false)` makes every call
/// fail with `Database`, for exercising outage paths.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<UserId, User>>,
    unavailable: AtomicBool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }

    fn check_available(&self) -> Result<(), UserStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(UserStoreError::Database("in-memory store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_identity_key(
        &self,
        identity_key: &str,
    ) -> Result<Option<User>, UserStoreError> {
        self.check_available()?;
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|u| u.identity_key == identity_key)
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError> {
        self.check_available()?;
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn save(&self, user: User) -> Result<User, UserStoreError> {
        self.check_available()?;
        let mut users = self.users.lock().await;

        if users
            .values()
            .any(|u| u.identity_key == user.identity_key && u.id != user.id)
        {
            return Err(UserStoreError::Conflict);
        }

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_plan(
        &self,
        id: UserId,
        plan: PlanTier,
    ) -> Result<Option<User>, UserStoreError> {
        self.check_available()?;
        let mut users = self.users.lock().await;

        Ok(users.get_mut(&id).map(|user| {
            user.plan = plan;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn ping(&self) -> Result<(), UserStoreError> {
        self.check_available()
    }
}
