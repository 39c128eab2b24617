//! Maps a validated token subject to a principal.

use crate::models::{Principal, UserId};
use crate::repositories::{UserStore, UserStoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Subject is not a UUID or no such user exists.
    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("User store error: {0}")]
    Store(#[from] UserStoreError),
}

/// Resolve `subject` to a principal using the user's current stored tier.
///
/// The tier claim inside the token is not consulted.
///
/// # Errors
///
/// `PrincipalNotFound` for unknown or unparseable subjects, `Store` for
/// store failures.
pub async fn resolve(store: &dyn UserStore, subject: &str) -> Result<Principal, ResolveError> {
    let id = UserId::parse(subject).ok_or(ResolveError::PrincipalNotFound)?;

    let user = store
        .find_by_id(id)
        .await?
        .ok_or(ResolveError::PrincipalNotFound)?;

    Ok(Principal::for_user(&user))
}
