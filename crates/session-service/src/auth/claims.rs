//! Session token claims.

use common::types::PlanTier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Claims carried by a session token.
///
/// `plan` is the tier at issuance and goes stale after an upgrade; access
/// decisions use the live tier from the user store instead.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Local user id. Redacted in Debug output.
    pub sub: String,

    /// Plan tier at issuance.
    pub plan: PlanTier,

    /// Issued-at (Unix seconds).
    pub iat: i64,

    /// Expiry (Unix seconds), always `iat + 7 days` for tokens we issue.
    pub exp: i64,
}

impl fmt::Debug for SessionClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClaims")
            .field("sub", &"[REDACTED]")
            .field("plan", &self.plan)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_subject() {
        let claims = SessionClaims {
            sub: "5b0c7a1e-0000-4000-8000-000000000001".to_string(),
            plan: PlanTier::Free,
            iat: 1_700_000_000,
            exp: 1_700_604_800,
        };

        let debug = format!("{claims:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("5b0c7a1e"));
        assert!(debug.contains("Free"));
    }

    #[test]
    fn test_wire_format() {
        let claims = SessionClaims {
            sub: "abc".to_string(),
            plan: PlanTier::Premium,
            iat: 10,
            exp: 20,
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"sub": "abc", "plan": "PREMIUM", "iat": 10, "exp": 20})
        );
    }
}
