//! Repository layer for the session service.
//!
//! # Components
//!
//! - `users` - `UserStore` trait with Postgres and in-memory implementations

pub mod users;

pub use users::{InMemoryUserStore, PgUserStore, UserStore, UserStoreError};
