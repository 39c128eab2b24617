//! Common data types for Nutrebirth components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque local identifier of a user (also the session token subject).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new random user ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a token subject. Anything that is not a UUID yields `None`.
    #[must_use]
    pub fn parse(subject: &str) -> Option<Self> {
        Uuid::parse_str(subject).ok().map(Self)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Subscription level controlling feature access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanTier {
    Free,
    Premium,
}

impl PlanTier {
    /// Wire and storage label: `FREE` or `PREMIUM`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "FREE",
            PlanTier::Premium => "PREMIUM",
        }
    }

    /// Authority granted to principals on this tier.
    #[must_use]
    pub fn authority(&self) -> &'static str {
        match self {
            PlanTier::Free => "ROLE_FREE",
            PlanTier::Premium => "ROLE_PREMIUM",
        }
    }

    #[must_use]
    pub fn is_premium(&self) -> bool {
        matches!(self, PlanTier::Premium)
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown plan label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlanTier(pub String);

impl fmt::Display for UnknownPlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown plan tier: {}", self.0)
    }
}

impl std::error::Error for UnknownPlanTier {}

impl FromStr for PlanTier {
    type Err = UnknownPlanTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(PlanTier::Free),
            "PREMIUM" => Ok(PlanTier::Premium),
            other => Err(UnknownPlanTier(other.to_string())),
        }
    }
}
