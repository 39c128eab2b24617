//! Login and logout.
//!
//! `POST /auth/google` exchanges a Google ID token for a session cookie.
//! `POST /auth/logout` asks the browser to drop it. Tokens are stateless, so
//! logout revokes nothing server-side.

use crate::auth::{clear_session_cookie, session_cookie};
use crate::errors::ApiError;
use crate::models::{GoogleLoginRequest, LogoutResponse, UserResponse};
use crate::observability::metrics::record_identity_exchange;
use crate::routes::AppState;
use crate::services::{exchange, ExchangeError};
use axum::{extract::State, http::header::SET_COOKIE, response::IntoResponse, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

/// Handle `POST /auth/google`.
///
/// Verifies `idToken` with the identity provider, finds or creates the
/// user and sets the session cookie. The token itself is not returned in
/// the body.
#[instrument(skip_all, name = "session.handlers.google_login")]
pub async fn google_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GoogleLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let assertion = payload.id_token.unwrap_or_default();
    if assertion.trim().is_empty() {
        tracing::debug!(target: "session.handlers.auth", "Login without idToken");
        record_identity_exchange("verification_failed");
        return Err(ApiError::AuthenticationFailed);
    }

    let identity = state.verifier.verify(&assertion).await.map_err(|e| {
        tracing::warn!(target: "session.handlers.auth", error = %e, "Identity assertion rejected");
        record_identity_exchange("verification_failed");
        ApiError::AuthenticationFailed
    })?;

    let (user, token) = exchange(state.store.as_ref(), &state.codec, &identity, Utc::now())
        .await
        .map_err(|e| match e {
            ExchangeError::Store(e) => ApiError::Database(e.to_string()),
            ExchangeError::Codec(e) => ApiError::Internal(e.to_string()),
        })?;

    let cookie = session_cookie(&state.config.cookie, &token)
        .map_err(|e| ApiError::Internal(format!("Session cookie: {e}")))?;

    tracing::info!(target: "session.handlers.auth", plan = %user.plan, "User logged in");
    Ok(([(SET_COOKIE, cookie)], Json(UserResponse::from(&user))))
}

/// Handle `POST /auth/logout`.
#[instrument(skip_all, name = "session.handlers.logout")]
pub async fn logout(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let cookie = clear_session_cookie(&state.config.cookie)
        .map_err(|e| ApiError::Internal(format!("Session cookie: {e}")))?;

    Ok(([(SET_COOKIE, cookie)], Json(LogoutResponse { ok: true })))
}
