//! Marketplace roles and role scoping for catalog entries
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The side of the marketplace a user is on. Selected once per session and
/// passed explicitly into every catalog and threshold lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Investor,
    Syndicator,
}

impl Role {
    pub const ALL: [Self; 2] = [Self::Investor, Self::Syndicator];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Investor => "investor",
            Self::Syndicator => "syndicator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognised role string. This is a caller bug, never a data problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role `{0}` (expected `investor` or `syndicator`)")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "investor" => Ok(Self::Investor),
            "syndicator" => Ok(Self::Syndicator),
            _ => Err(InvalidRole(s.to_string())),
        }
    }
}

/// Which roles a catalog entry is offered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleScope {
    Investor,
    Syndicator,
    Both,
}

impl RoleScope {
    #[must_use]
    pub const fn applies_to(self, role: Role) -> bool {
        matches!(
            (self, role),
            (Self::Both, _) | (Self::Investor, Role::Investor) | (Self::Syndicator, Role::Syndicator)
        )
    }
}
