//! HTTP middleware for the session service.
//!
//! - `auth` - per-request authentication and the `require_auth` /
//!   `require_premium` route guards
//! - `http_metrics` - request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{
    authenticate, require_auth, require_premium, AuthState, CredentialPlan, SecurityContext,
    UnauthenticatedReason,
};
pub use http_metrics::http_metrics_middleware;
