//! Exclusion error types.

use crate::account::AccountId;
use crate::db::StoreError;
use thiserror::Error;

/// Exclusion errors
#[derive(Debug, Error)]
pub enum ExclusionError {
    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Exclusions must last a positive amount of time
    #[error("Invalid exclusion duration: {0}")]
    InvalidDuration(chrono::Duration),

    /// The role may not exclude gamblers
    #[error("Not authorized to exclude")]
    Unauthorized,
}

impl ExclusionError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            ExclusionError::Store(_) => "Internal server error".to_string(),
            ExclusionError::AccountNotFound(_) => "Account not found".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for exclusion operations
pub type ExclusionResult<T> = Result<T, ExclusionError>;
