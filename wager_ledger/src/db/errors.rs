//! Persistence error types.

use crate::account::{AccountId, UserId};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Operation did not finish in time
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// The account changed since it was read
    #[error("Account {account_id} was modified concurrently")]
    VersionConflict { account_id: AccountId },

    /// A second active account would have been created
    #[error("User {user_id} already has an active account")]
    ActiveAccountExists { user_id: UserId },

    /// The user holds a permanent ban, so no account may become active
    #[error("User {user_id} is permanently banned")]
    UserBanned { user_id: UserId },

    /// The wager was completed by someone else
    #[error("Wager {0} is no longer pending")]
    StaleWager(Uuid),

    /// Row referenced by a write does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored value could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the same operation on fresh state may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
