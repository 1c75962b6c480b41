use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether the operator may currently read a client's metering data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthorizationStatus {
    Active,
    Revoked,
}

impl AuthorizationStatus {
    /// Maps the provider's `authorized` flag onto a status.
    pub fn from_authorized(authorized: bool) -> Self {
        if authorized {
            AuthorizationStatus::Active
        } else {
            AuthorizationStatus::Revoked
        }
    }

    /// The label stored in the `authorizations.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::Active => "ACTIVE",
            AuthorizationStatus::Revoked => "REVOKED",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorizationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(AuthorizationStatus::Active),
            "REVOKED" => Ok(AuthorizationStatus::Revoked),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}
