//! HTTP request handlers for the session service.

pub mod auth_handler;
pub mod health;
pub mod me;
pub mod metrics;
pub mod payment;

pub use auth_handler::{google_login, logout};
pub use health::{health_check, readiness_check};
pub use me::{get_me, get_premium};
pub use metrics::metrics_handler;
pub use payment::verify_payment;
