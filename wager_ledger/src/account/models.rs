//! Account data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Platform user ID type
pub type UserId = i64;

/// Gambler account ID type
pub type AccountId = i64;

/// Gambler account model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamblerAccount {
    pub id: AccountId,
    pub user_id: UserId,
    pub balance: Decimal,
    pub state: AccountState,
    /// Hex-encoded seed fixed for the account's lifetime
    pub random_seed: String,
    pub total_wagered: Decimal,
    /// `None` once every VIP tier has been granted
    pub next_vip_wager_threshold: Option<Decimal>,
    /// Incremented by every committed write
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl GamblerAccount {
    /// Whether the account may place wagers
    pub fn is_active(&self) -> bool {
        self.state == AccountState::Active
    }
}

/// Account lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Active,
    AdministrativelyDisabled,
    Abandoned,
    PermanentlyBanned,
    Liquidated,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Active => "active",
            AccountState::AdministrativelyDisabled => "administratively_disabled",
            AccountState::Abandoned => "abandoned",
            AccountState::PermanentlyBanned => "permanently_banned",
            AccountState::Liquidated => "liquidated",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Active and disabled accounts may go anywhere; abandoned and liquidated
    /// accounts may only be banned; a ban is final.
    pub fn can_transition_to(&self, next: AccountState) -> bool {
        use AccountState::*;

        if *self == next {
            return false;
        }

        match self {
            Active => true,
            AdministrativelyDisabled => true,
            Abandoned | Liquidated => next == PermanentlyBanned,
            PermanentlyBanned => false,
        }
    }
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountState::Active),
            "administratively_disabled" => Ok(AccountState::AdministrativelyDisabled),
            "abandoned" => Ok(AccountState::Abandoned),
            "permanently_banned" => Ok(AccountState::PermanentlyBanned),
            "liquidated" => Ok(AccountState::Liquidated),
            other => Err(format!("unknown account state '{other}'")),
        }
    }
}

/// Authority of whoever issues a command against the ledger.
///
/// This is a closed set; values that do not parse are rejected rather than
/// compared numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Gambler,
    Hostess,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Gambler => "gambler",
            Role::Hostess => "hostess",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Hostesses and above may put gamblers on a betting break
    pub fn can_exclude(&self) -> bool {
        match self {
            Role::Gambler => false,
            Role::Hostess | Role::Admin | Role::Owner => true,
        }
    }

    /// Balance adjustments, bans and state changes
    pub fn can_administer(&self) -> bool {
        match self {
            Role::Gambler | Role::Hostess => false,
            Role::Admin | Role::Owner => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gambler" => Ok(Role::Gambler),
            "hostess" => Ok(Role::Hostess),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}
