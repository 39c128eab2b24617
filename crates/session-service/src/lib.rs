//! Session service library.
//!
//! Stateless session authentication for the Nutrebirth web app:
//!
//! - Google ID token login, exchanged for a signed session token in an
//!   `HttpOnly` cookie
//! - Per-request authentication that resolves the caller against the
//!   user store, using the stored plan tier
//! - Premium gating and payment-confirmed plan upgrades
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/*.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - signing key, token codec, cookies, identity verification
//! - `config` - service configuration from environment
//! - `errors` - error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - authentication, route guards, HTTP metrics
//! - `models` - data models and response bodies
//! - `observability` - Prometheus metrics
//! - `repositories` - user store trait and implementations
//! - `routes` - Axum router setup
//! - `services` - identity exchange, principal resolution, payment upgrade

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
