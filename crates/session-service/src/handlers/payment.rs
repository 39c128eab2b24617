//! Payment confirmation handler.

use crate::auth::session_cookie;
use crate::errors::ApiError;
use crate::models::{PaymentVerifyRequest, PaymentVerifyResponse, Principal, UserResponse};
use crate::observability::metrics::record_plan_upgrade;
use crate::routes::AppState;
use crate::services::payment::{upgrade_to_premium, verify_signature, UpgradeError};
use axum::{extract::State, http::header::SET_COOKIE, response::IntoResponse, Extension, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

/// Non-blank value of a request field.
fn required(field: Option<&String>) -> Option<&str> {
    field.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Handler for `POST /payment/verify`.
///
/// # Responses
///
/// - 400 when a field is missing or the signature does not match
/// - 503 when no gateway secret is configured
/// - 200 with `{user}` and a fresh session cookie on upgrade
#[instrument(skip_all, name = "session.handlers.payment_verify")]
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<PaymentVerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(order_id), Some(payment_id), Some(signature)) = (
        required(payload.razorpay_order_id.as_ref()),
        required(payload.razorpay_payment_id.as_ref()),
        required(payload.razorpay_signature.as_ref()),
    ) else {
        return Err(ApiError::BadRequest("Missing payment details".to_string()));
    };

    let Some(key_secret) = state.config.payment_key_secret.as_ref() else {
        record_plan_upgrade("unconfigured");
        return Err(ApiError::ServiceUnavailable(
            "Payment gateway secret is not configured".to_string(),
        ));
    };

    if !verify_signature(order_id, payment_id, signature, key_secret) {
        tracing::warn!(target: "session.handlers.payment", "Payment signature mismatch");
        record_plan_upgrade("invalid_signature");
        return Err(ApiError::BadRequest("Invalid payment signature".to_string()));
    }

    let (user, token) =
        upgrade_to_premium(state.store.as_ref(), &state.codec, principal.subject_id, Utc::now())
            .await
            .map_err(|e| match e {
                UpgradeError::UserNotFound => ApiError::Unauthenticated,
                UpgradeError::Store(e) => ApiError::Database(e.to_string()),
                UpgradeError::Codec(e) => ApiError::Internal(e.to_string()),
            })?;

    let cookie = session_cookie(&state.config.cookie, &token)
        .map_err(|e| ApiError::Internal(format!("Session cookie: {e}")))?;

    Ok((
        [(SET_COOKIE, cookie)],
        Json(PaymentVerifyResponse {
            user: UserResponse::from(&user),
        }),
    ))
}
