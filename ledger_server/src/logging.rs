//! Structured logging for the ledger server.
//!
//! The library logs through the `log` facade; `tracing-subscriber` installs a
//! bridge on init, so those records land in the same output as the server's
//! own events.

use rust_decimal::Decimal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Initialize structured logging
///
/// Levels come from `RUST_LOG`, defaulting to `info,sqlx=warn,hyper=warn`.
///
/// # Example
///
/// ```no_run
/// use ledger_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a placed, resolved or rejected wager
///
/// # Arguments
///
/// * `event_type` - `placed`, `resolved` or `rejected`
/// * `user_id` - Platform user, when known
/// * `wager_id` - Wager, once one exists
/// * `amount` - Stake or final effect
/// * `outcome` - Outcome description or rejection reason
///
/// # Example
///
/// ```
/// use ledger_server::logging::log_wager_event;
/// use rust_decimal::Decimal;
///
/// log_wager_event("rejected", Some(42), None, Decimal::from(100), "InsufficientBalance");
/// ```
pub fn log_wager_event(
    event_type: &str,
    user_id: Option<i64>,
    wager_id: Option<Uuid>,
    amount: Decimal,
    outcome: &str,
) {
    tracing::info!(
        event_type = event_type,
        user_id = user_id,
        wager_id = ?wager_id,
        amount = %amount,
        "WAGER: {}",
        outcome
    );
}

/// Log an operator action against an account or user
///
/// # Arguments
///
/// * `action` - What was done (`exclude`, `adjust`, `ban`)
/// * `role` - Role claimed by the operator
/// * `target` - Account or user the action applies to
/// * `message` - Details
pub fn log_admin_action(action: &str, role: &str, target: i64, message: &str) {
    tracing::warn!(
        action = action,
        role = role,
        target = target,
        "ADMIN: {}",
        message
    );
}

/// Log performance metric
///
/// Operations slower than a second are logged as warnings.
///
/// # Example
///
/// ```
/// use ledger_server::logging::log_performance;
/// use std::time::Instant;
///
/// let start = Instant::now();
/// // ... do work ...
/// let duration = start.elapsed().as_millis() as u64;
/// log_performance("place_wager", duration, Some("dice"));
/// ```
pub fn log_performance(operation: &str, duration_ms: u64, metadata: Option<&str>) {
    if duration_ms > 1000 {
        tracing::warn!(
            operation = operation,
            duration_ms = duration_ms,
            metadata = metadata,
            "PERFORMANCE: Slow operation"
        );
    } else {
        tracing::debug!(
            operation = operation,
            duration_ms = duration_ms,
            metadata = metadata,
            "Performance metric"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_wager_event() {
        log_wager_event("placed", Some(1), Some(Uuid::new_v4()), Decimal::from(10), "Won 5 on dice (1.5x)");
        log_wager_event("rejected", None, None, Decimal::ONE, "Excluded");
    }

    #[test]
    fn test_log_admin_action() {
        log_admin_action("ban", "admin", 7, "User permanently banned");
    }

    #[test]
    fn test_log_performance() {
        log_performance("place_wager", 5, Some("dice"));
        log_performance("audit", 2000, None);
    }
}
