//! Session authentication core.
//!
//! - `signing_key` - HMAC secret holder, fails fast when unconfigured
//! - `claims` - session token claims
//! - `codec` - HS256 session token encode/decode
//! - `cookie` - session cookie building and credential extraction
//! - `google` - external identity assertion verification

pub mod claims;
pub mod codec;
pub mod cookie;
pub mod google;
pub mod signing_key;

pub use claims::SessionClaims;
pub use codec::{CodecError, CredentialError, SessionCodec};
pub use cookie::{clear_session_cookie, extract_credential, session_cookie, CredentialSource};
pub use google::{GoogleIdTokenVerifier, IdentityVerifier, VerificationError, VerifierInitError};
pub use signing_key::SigningKey;
