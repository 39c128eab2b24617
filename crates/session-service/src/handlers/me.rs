//! Current user and entitlement handlers.

use crate::errors::ApiError;
use crate::middleware::CredentialPlan;
use crate::models::{EntitlementResponse, Features, MeResponse, Principal};
use crate::routes::AppState;
use axum::{extract::State, Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for `GET /me`.
///
/// Profile and `plan` come from the stored user. `credential_plan` is the
/// tier embedded in the presented token and lags `plan` until the token is
/// reissued.
#[instrument(skip_all, name = "session.handlers.me")]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Extension(CredentialPlan(credential_plan)): Extension<CredentialPlan>,
) -> Result<Json<MeResponse>, ApiError> {
    let user = state
        .store
        .find_by_id(principal.subject_id)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?
        .ok_or(ApiError::Unauthenticated)?;

    Ok(Json(MeResponse {
        email: user.identity_key,
        name: user.display_name,
        picture_url: user.picture_url,
        plan: user.plan,
        credential_plan,
        features: Features::for_plan(user.plan),
    }))
}

/// Handler for `GET /me/premium`. Only reachable through `require_premium`.
#[instrument(skip_all, name = "session.handlers.premium")]
pub async fn get_premium(Extension(principal): Extension<Principal>) -> Json<EntitlementResponse> {
    tracing::debug!(target: "session.handlers.me", "Premium entitlement confirmed");

    Json(EntitlementResponse {
        plan: principal.plan,
        features: Features::for_plan(principal.plan),
    })
}
