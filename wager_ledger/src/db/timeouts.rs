//! Database query timeout helpers
//!
//! Bounds every store round trip so a stuck connection surfaces as an error
//! instead of holding an account lock forever.

use super::errors::{StoreError, StoreResult};
use std::time::Duration;
use tokio::time::timeout;

/// Default timeout for single queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for multi-statement commits (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for migrations and other long-running operations (30 seconds)
pub const LONG_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Execute a store operation with timeout
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - Async operation to execute
///
/// # Returns
///
/// * `StoreResult<T>` - Result, the operation's own error, or `StoreError::Timeout`
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> StoreResult<T>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: Into<StoreError>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(StoreError::Timeout(duration)),
    }
}

/// Execute a query with default timeout (5 seconds)
pub async fn with_default_timeout<F, T, E>(future: F) -> StoreResult<T>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: Into<StoreError>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}
