//! Wager error types.

use crate::{
    account::{AccountError, AccountId, AccountState, UserId},
    db::StoreError,
    exclusion::ExclusionError,
    ledger::LedgerError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Wager errors
#[derive(Debug, Error)]
pub enum WagerError {
    /// Amount or outcome out of bounds
    #[error("Invalid wager: {0}")]
    InvalidWager(String),

    /// Betting break in force
    #[error("Excluded from betting until {until}")]
    Excluded { until: DateTime<Utc> },

    /// Account may not place wagers
    #[error("Account is {0}")]
    AccountInactive(AccountState),

    /// Insufficient balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        available: Decimal,
        required: Decimal,
    },

    /// The user is permanently banned
    #[error("User {0} is permanently banned")]
    PermanentBan(UserId),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Wager not found
    #[error("Wager not found: {0}")]
    WagerNotFound(Uuid),

    /// Wager already resolved
    #[error("Wager {0} is already complete")]
    WagerAlreadyComplete(Uuid),

    /// Balance or volume out of range
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// Every commit attempt lost a version race
    #[error("Account modified concurrently; gave up after {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },

    /// Account lookup or creation failed
    #[error("Account error: {0}")]
    Account(AccountError),

    /// Exclusion lookup failed
    #[error("Exclusion error: {0}")]
    Exclusion(ExclusionError),

    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<LedgerError> for WagerError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::InsufficientBalance {
                available,
                required,
            } => WagerError::InsufficientBalance {
                available,
                required,
            },
            LedgerError::ArithmeticOverflow => WagerError::ArithmeticOverflow,
            LedgerError::ConcurrencyConflict { attempts } => {
                WagerError::ConcurrencyConflict { attempts }
            }
            LedgerError::AccountNotFound(id) => WagerError::AccountNotFound(id),
            LedgerError::Store(StoreError::StaleWager(id)) => WagerError::WagerAlreadyComplete(id),
            other => WagerError::Ledger(other),
        }
    }
}

impl From<AccountError> for WagerError {
    fn from(error: AccountError) -> Self {
        match error {
            AccountError::PermanentBan(user_id) => WagerError::PermanentBan(user_id),
            AccountError::AccountNotFound(id) => WagerError::AccountNotFound(id),
            other => WagerError::Account(other),
        }
    }
}

impl From<ExclusionError> for WagerError {
    fn from(error: ExclusionError) -> Self {
        match error {
            ExclusionError::AccountNotFound(id) => WagerError::AccountNotFound(id),
            other => WagerError::Exclusion(other),
        }
    }
}

impl WagerError {
    /// Reason code reported to the caller when a wager is turned down.
    ///
    /// `None` for failures that are not a decision about the wager itself.
    pub fn rejection_reason(&self) -> Option<&'static str> {
        match self {
            WagerError::InsufficientBalance { .. } => Some("InsufficientBalance"),
            WagerError::Excluded { .. } => Some("Excluded"),
            WagerError::AccountInactive(_) => Some("AccountInactive"),
            WagerError::InvalidWager(_) => Some("InvalidWager"),
            WagerError::PermanentBan(_) => Some("PermanentBan"),
            _ => None,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            // Sanitize persistence errors - don't expose SQL details
            WagerError::Store(_) => "Internal server error".to_string(),
            WagerError::Account(e) => e.client_message(),
            WagerError::Exclusion(e) => e.client_message(),
            WagerError::Ledger(e) => e.client_message(),
            WagerError::PermanentBan(_) => "User is permanently banned".to_string(),
            WagerError::AccountNotFound(_) => "Account not found".to_string(),
            WagerError::WagerNotFound(_) => "Wager not found".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for wager operations
pub type WagerResult<T> = Result<T, WagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_map_to_wager_reasons() {
        let err = WagerError::from(LedgerError::InsufficientBalance {
            available: Decimal::ONE,
            required: Decimal::TEN,
        });
        assert_eq!(err.rejection_reason(), Some("InsufficientBalance"));

        let id = Uuid::new_v4();
        let err = WagerError::from(LedgerError::Store(StoreError::StaleWager(id)));
        assert!(matches!(err, WagerError::WagerAlreadyComplete(w) if w == id));
        assert_eq!(err.rejection_reason(), None);
    }

    #[test]
    fn test_store_errors_are_sanitized() {
        let err = WagerError::from(LedgerError::Store(StoreError::Corrupt(
            "state column held 'zombie'".to_string(),
        )));
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_ban_reason() {
        let err = WagerError::from(AccountError::PermanentBan(3));
        assert_eq!(err.rejection_reason(), Some("PermanentBan"));
        assert_eq!(err.client_message(), "User is permanently banned");
    }
}
