//! Common utilities and types shared across Nutrebirth components.

#![warn(clippy::pedantic)]

/// Module for common data types (user ids, plan tiers)
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, session lifetime, shape checks)
pub mod jwt;
