//! Ledger error types.

use crate::account::AccountId;
use crate::db::StoreError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A balance or counter would leave the representable range
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Insufficient balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        available: Decimal,
        required: Decimal,
    },

    /// Source and destination of a transfer are the same account
    #[error("Cannot transfer to the same account")]
    SelfTransfer,

    /// Every commit attempt lost a version race
    #[error("Account modified concurrently; gave up after {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },
}

impl LedgerError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            // Sanitize persistence errors - don't expose SQL details
            LedgerError::Store(_) => "Internal server error".to_string(),
            LedgerError::AccountNotFound(_) => "Account not found".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
