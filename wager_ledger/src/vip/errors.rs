//! VIP error types.

use crate::ledger::LedgerError;
use thiserror::Error;

/// VIP errors
#[derive(Debug, Error)]
pub enum VipError {
    /// Levels do not form a strictly increasing schedule
    #[error("Invalid VIP schedule: {0}")]
    InvalidSchedule(String),

    /// Granting failed in the ledger
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type for VIP operations
pub type VipResult<T> = Result<T, VipError>;
