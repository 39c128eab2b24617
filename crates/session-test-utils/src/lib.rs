//! # Session Test Utilities
//!
//! Shared test utilities for the session service.
//!
//! This crate provides:
//! - Server test harness (`TestSessionServer` for E2E tests)
//! - Token builders for valid, expired, forged and malformed tokens
//! - Fixed fixtures (secrets, identities, payment signatures)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use session_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestSessionServer::spawn().await?;
//!     let login = server.login("asha@example.com").await?;
//!
//!     let response = server
//!         .client()
//!         .get(format!("{}/me", server.url()))
//!         .header("cookie", login.cookie_header())
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
