//! HTTP routes for the session service.
//!
//! Defines the Axum router and application state.

use crate::auth::{IdentityVerifier, SessionCodec};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{
    authenticate, http_metrics_middleware, require_auth, require_premium, AuthState,
};
use crate::repositories::UserStore;
use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowHeaders, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// User persistence.
    pub store: Arc<dyn UserStore>,

    /// External identity verification.
    pub verifier: Arc<dyn IdentityVerifier>,

    /// Session token encode/decode, sharing one signing key.
    pub codec: SessionCodec,

    /// Service configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// - `/health`, `/ready`, `/metrics` - operational, public
/// - `/auth/google`, `/auth/logout` - public
/// - `/me`, `/payment/verify` - `require_auth`
/// - `/me/premium` - `require_premium`
///
/// Every request passes through `authenticate`, then CORS, tracing, a 30
/// second timeout and HTTP metrics (outermost).
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        codec: state.codec.clone(),
        store: Arc::clone(&state.store),
        cookie_name: state.config.cookie.name.clone(),
    });

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/auth/google", post(handlers::google_login))
        .route("/auth/logout", post(handlers::logout))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/me", get(handlers::get_me))
        .route("/payment/verify", post(handlers::verify_payment))
        .route_layer(middleware::from_fn(require_auth))
        .with_state(state.clone());

    let premium_routes = Router::new()
        .route("/me/premium", get(handlers::get_premium))
        .route_layer(middleware::from_fn(require_premium));

    // Layers run outermost-last: metrics, timeout, trace, CORS, authenticate.
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .merge(premium_routes)
        .layer(middleware::from_fn_with_state(auth_state, authenticate))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// Credentialed CORS for the configured browser origins.
///
/// Origins were validated when the config was loaded; any that still fail
/// header parsing are skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(target: "session.routes", origin = %origin, error = %e, "Skipping CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
