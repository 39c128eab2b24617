//! Service layer for the session service.
//!
//! # Components
//!
//! - `identity_exchange` - verified identity to local user and session token
//! - `principal_resolver` - token subject to principal with live authorities
//! - `payment` - gateway signature check and PREMIUM upgrade

pub mod identity_exchange;
pub mod payment;
pub mod principal_resolver;

pub use identity_exchange::{exchange, ExchangeError};
pub use principal_resolver::{resolve, ResolveError};
