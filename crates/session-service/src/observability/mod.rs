//! Observability for the session service.
//!
//! - `metrics` - Prometheus recorder and counter helpers

pub mod metrics;
