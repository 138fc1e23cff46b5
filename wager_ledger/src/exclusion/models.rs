//! Exclusion data models.

use crate::account::{AccountId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Time-boxed betting ban
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub id: i64,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub source: ExclusionSource,
}

impl Exclusion {
    /// Active until (not including) the expiry instant
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Exclusion not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewExclusion {
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub source: ExclusionSource,
}

/// Who imposed an exclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionSource {
    Hostess,
    Administrative,
}

impl ExclusionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionSource::Hostess => "hostess",
            ExclusionSource::Administrative => "administrative",
        }
    }

    /// Source recorded for an exclusion issued by `role`, if it may issue one
    pub fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::Gambler => None,
            Role::Hostess => Some(ExclusionSource::Hostess),
            Role::Admin | Role::Owner => Some(ExclusionSource::Administrative),
        }
    }
}

impl fmt::Display for ExclusionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExclusionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hostess" => Ok(ExclusionSource::Hostess),
            "administrative" => Ok(ExclusionSource::Administrative),
            other => Err(format!("unknown exclusion source '{other}'")),
        }
    }
}
