//! Account error types.

use super::models::{AccountId, AccountState, UserId};
use crate::db::StoreError;
use thiserror::Error;

/// Account errors
#[derive(Debug, Error)]
pub enum AccountError {
    /// Persistence error
    #[error("Store error: {0}")]
    Store(StoreError),

    /// The user is permanently banned
    #[error("User {0} is permanently banned")]
    PermanentBan(UserId),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// User has no active account
    #[error("User {0} has no active account")]
    NoActiveAccount(UserId),

    /// Reactivation would give the user a second active account
    #[error("User {0} already has an active account")]
    ActiveAccountExists(UserId),

    /// Lifecycle does not allow the move
    #[error("Cannot move account from {from} to {to}")]
    InvalidStateTransition { from: AccountState, to: AccountState },

    /// Every attempt lost a version race
    #[error("Account modified concurrently; gave up after {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },
}

impl From<StoreError> for AccountError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UserBanned { user_id } => AccountError::PermanentBan(user_id),
            other => AccountError::Store(other),
        }
    }
}

impl AccountError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Persistence errors are sanitized and user/account IDs are redacted.
    pub fn client_message(&self) -> String {
        match self {
            // Sanitize persistence errors - don't expose SQL details
            AccountError::Store(_) => "Internal server error".to_string(),
            AccountError::PermanentBan(_) => "User is permanently banned".to_string(),
            AccountError::AccountNotFound(_) => "Account not found".to_string(),
            AccountError::NoActiveAccount(_) => "No active account".to_string(),
            AccountError::ActiveAccountExists(_) => "User already has an active account".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for account operations
pub type AccountResult<T> = Result<T, AccountError>;
