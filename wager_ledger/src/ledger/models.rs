//! Ledger data models.

use crate::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Ledger transaction model (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: AccountId,
    pub event_source: EventSource,
    pub effect: Decimal,
    /// Balance after this entry; equals the previous entry's plus `effect`
    pub new_balance: Decimal,
    pub comment: Option<String>,
    pub counterparty_account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

/// What caused a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Other,
    Juicer,
    Gambling,
    Administrative,
    Bonus,
    Rakeback,
    Reload,
    Hostess,
    Lossback,
    DailyDollar,
    Rain,
    Deposit,
    Withdraw,
    Sponsorship,
    Loan,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Other => "other",
            EventSource::Juicer => "juicer",
            EventSource::Gambling => "gambling",
            EventSource::Administrative => "administrative",
            EventSource::Bonus => "bonus",
            EventSource::Rakeback => "rakeback",
            EventSource::Reload => "reload",
            EventSource::Hostess => "hostess",
            EventSource::Lossback => "lossback",
            EventSource::DailyDollar => "daily_dollar",
            EventSource::Rain => "rain",
            EventSource::Deposit => "deposit",
            EventSource::Withdraw => "withdraw",
            EventSource::Sponsorship => "sponsorship",
            EventSource::Loan => "loan",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "other" => Ok(EventSource::Other),
            "juicer" => Ok(EventSource::Juicer),
            "gambling" => Ok(EventSource::Gambling),
            "administrative" => Ok(EventSource::Administrative),
            "bonus" => Ok(EventSource::Bonus),
            "rakeback" => Ok(EventSource::Rakeback),
            "reload" => Ok(EventSource::Reload),
            "hostess" => Ok(EventSource::Hostess),
            "lossback" => Ok(EventSource::Lossback),
            "daily_dollar" => Ok(EventSource::DailyDollar),
            "rain" => Ok(EventSource::Rain),
            "deposit" => Ok(EventSource::Deposit),
            "withdraw" => Ok(EventSource::Withdraw),
            "sponsorship" => Ok(EventSource::Sponsorship),
            "loan" => Ok(EventSource::Loan),
            other => Err(format!("unknown event source '{other}'")),
        }
    }
}

/// Transaction not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub event_source: EventSource,
    pub effect: Decimal,
    pub new_balance: Decimal,
    pub comment: Option<String>,
    pub counterparty_account_id: Option<AccountId>,
}

/// Result of checking an account against its own history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAudit {
    pub account_id: AccountId,
    pub balance: Decimal,
    /// Sum of every transaction effect
    pub ledger_sum: Decimal,
    pub transaction_count: usize,
    pub total_wagered: Decimal,
    /// Sum of every wager amount
    pub recomputed_total_wagered: Decimal,
    /// IDs of transactions whose `new_balance` does not follow from the previous entry
    pub broken_chain_at: Vec<i64>,
}

impl LedgerAudit {
    /// Whether the account agrees with its history on every count
    pub fn is_consistent(&self) -> bool {
        self.balance == self.ledger_sum
            && self.total_wagered == self.recomputed_total_wagered
            && self.broken_chain_at.is_empty()
    }
}
