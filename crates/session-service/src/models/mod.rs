//! Data models for the session service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use common::types::{PlanTier, UserId};

/// A registered user.
///
/// `identity_key` is the verified email and is unique across users. The
/// `id` is generated once at creation and is the session token subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub identity_key: String,
    pub display_name: String,
    pub picture_url: Option<String>,
    pub plan: PlanTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New FREE-tier user built from a verified identity.
    pub fn from_identity(identity: &VerifiedIdentity, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            identity_key: identity.identity_key.clone(),
            display_name: identity.display_name.clone(),
            picture_url: identity.picture_url.clone(),
            plan: PlanTier::Free,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Identity asserted by the external provider after verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub identity_key: String,
    pub display_name: String,
    pub picture_url: Option<String>,
}

/// Authenticated caller for one request.
///
/// Authorities come from the stored plan tier at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: UserId,
    pub plan: PlanTier,
    pub authorities: Vec<&'static str>,
}

impl Principal {
    pub fn for_user(user: &User) -> Self {
        Self {
            subject_id: user.id,
            plan: user.plan,
            authorities: vec![user.plan.authority()],
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| *a == authority)
    }
}

/// Request body for `POST /auth/google`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    pub id_token: Option<String>,
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
    pub plan: PlanTier,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            email: user.identity_key.clone(),
            name: user.display_name.clone(),
            plan: user.plan,
        }
    }
}

/// Feature flags derived from the plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub full_diet_plan: bool,
    pub export_pdf: bool,
}

impl Features {
    pub fn for_plan(plan: PlanTier) -> Self {
        Self {
            full_diet_plan: plan.is_premium(),
            export_pdf: plan.is_premium(),
        }
    }
}

/// Response for `GET /me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    /// Live tier from the user store.
    pub plan: PlanTier,
    /// Tier embedded in the presented session token (may be stale).
    pub credential_plan: PlanTier,
    pub features: Features,
}

/// Request body for `POST /payment/verify`.
#[derive(Debug, Deserialize)]
pub struct PaymentVerifyRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

/// Response for `POST /payment/verify`.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentVerifyResponse {
    pub user: UserResponse,
}

/// Response for `POST /auth/logout`.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub ok: bool,
}

/// Response for `GET /me/premium`.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementResponse {
    pub plan: PlanTier,
    pub features: Features,
}

/// Readiness probe response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub database: String,
}
