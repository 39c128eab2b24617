//! Request authentication and route guards.
//!
//! `authenticate` runs on every request and never rejects: it attaches a
//! [`SecurityContext`] describing who the caller is (or why they are not
//! anyone). `require_auth` and `require_premium` are the route-level guards
//! that turn that context into 401/403 responses, or 503 when the user
//! store could not be reached.

use crate::auth::{extract_credential, CredentialError, SessionClaims, SessionCodec};
use crate::errors::ApiError;
use crate::models::Principal;
use crate::observability::metrics::record_authentication;
use crate::repositories::UserStore;
use crate::services::{resolve, ResolveError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::types::PlanTier;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub codec: SessionCodec,
    pub store: Arc<dyn UserStore>,
    pub cookie_name: String,
}

/// Why a request carries no principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    NoCredential,
    Expired,
    Malformed,
    InvalidSignature,
    PrincipalNotFound,
    StoreError,
}

impl UnauthenticatedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnauthenticatedReason::NoCredential => "no_credential",
            UnauthenticatedReason::Expired => "expired",
            UnauthenticatedReason::Malformed => "malformed",
            UnauthenticatedReason::InvalidSignature => "invalid_signature",
            UnauthenticatedReason::PrincipalNotFound => "principal_not_found",
            UnauthenticatedReason::StoreError => "store_error",
        }
    }
}

impl From<CredentialError> for UnauthenticatedReason {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Expired => UnauthenticatedReason::Expired,
            CredentialError::Malformed => UnauthenticatedReason::Malformed,
            CredentialError::InvalidSignature => UnauthenticatedReason::InvalidSignature,
        }
    }
}

/// Outcome of authenticating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityContext {
    Authenticated(Principal),
    Unauthenticated(UnauthenticatedReason),
}

impl SecurityContext {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SecurityContext::Authenticated(principal) => Some(principal),
            SecurityContext::Unauthenticated(_) => None,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            SecurityContext::Authenticated(_) => "authenticated",
            SecurityContext::Unauthenticated(reason) => reason.as_str(),
        }
    }
}

/// Tier embedded in the presented token, which may lag the stored tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPlan(pub PlanTier);

/// Attach a [`SecurityContext`] to every request.
///
/// Failures are logged and counted, then the request continues
/// unauthenticated. Routes that need a principal add `require_auth`.
#[instrument(skip_all, name = "session.middleware.authenticate")]
pub async fn authenticate(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let (context, claims) = match extract_credential(req.headers(), &state.cookie_name) {
        None => {
            tracing::debug!(target: "session.middleware.auth", "No session credential presented");
            (
                SecurityContext::Unauthenticated(UnauthenticatedReason::NoCredential),
                None,
            )
        }
        Some((token, source)) => match state.codec.decode(&token) {
            Err(err) => {
                tracing::warn!(
                    target: "session.middleware.auth",
                    reason = err.as_str(),
                    source = source.as_str(),
                    "Rejected session credential"
                );
                (SecurityContext::Unauthenticated(err.into()), None)
            }
            Ok(claims) => (resolve_principal(state.store.as_ref(), &claims).await, Some(claims)),
        },
    };

    record_authentication(context.outcome());

    if let (SecurityContext::Authenticated(_), Some(claims)) = (&context, claims) {
        req.extensions_mut().insert(CredentialPlan(claims.plan));
    }
    req.extensions_mut().insert(context);

    next.run(req).await
}

async fn resolve_principal(store: &dyn UserStore, claims: &SessionClaims) -> SecurityContext {
    match resolve(store, &claims.sub).await {
        Ok(principal) => {
            tracing::debug!(target: "session.middleware.auth", plan = %principal.plan, "Request authenticated");
            SecurityContext::Authenticated(principal)
        }
        Err(ResolveError::PrincipalNotFound) => {
            tracing::warn!(target: "session.middleware.auth", "Session subject has no user");
            SecurityContext::Unauthenticated(UnauthenticatedReason::PrincipalNotFound)
        }
        Err(ResolveError::Store(e)) => {
            tracing::error!(target: "session.middleware.auth", error = %e, "User store failed during authentication");
            SecurityContext::Unauthenticated(UnauthenticatedReason::StoreError)
        }
    }
}

fn context_of(req: &Request) -> SecurityContext {
    req.extensions()
        .get::<SecurityContext>()
        .cloned()
        .unwrap_or(SecurityContext::Unauthenticated(
            UnauthenticatedReason::NoCredential,
        ))
}

/// Principal for a guarded route.
///
/// A store failure is a server error, not a missing session.
fn principal_of(req: &Request) -> Result<Principal, ApiError> {
    match context_of(req) {
        SecurityContext::Authenticated(principal) => Ok(principal),
        SecurityContext::Unauthenticated(UnauthenticatedReason::StoreError) => Err(
            ApiError::ServiceUnavailable("user store unavailable during authentication".to_string()),
        ),
        SecurityContext::Unauthenticated(_) => Err(ApiError::Unauthenticated),
    }
}

/// Reject unauthenticated requests with 401 and expose the [`Principal`].
///
/// The response does not say why authentication failed.
#[instrument(skip_all, name = "session.middleware.require_auth")]
pub async fn require_auth(mut req: Request, next: Next) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_of(&req)?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Require the premium authority; 401 without a principal, 403 without the tier.
#[instrument(skip_all, name = "session.middleware.require_premium")]
pub async fn require_premium(mut req: Request, next: Next) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_of(&req)?;

    if !principal.has_authority(PlanTier::Premium.authority()) {
        tracing::debug!(target: "session.middleware.auth", "Premium authority missing");
        return Err(ApiError::Forbidden("Premium plan required".to_string()));
    }

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
