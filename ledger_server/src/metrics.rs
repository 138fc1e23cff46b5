//! Prometheus metrics for the ledger server.
//!
//! Metrics go through the `metrics` facade; when no exporter is installed the
//! calls are no-ops, so handlers record unconditionally.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ledger_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::wagers_placed_total("dice");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Wager Metrics
// ============================================================================

/// Increment accepted wagers counter.
pub fn wagers_placed_total(game: &str) {
    metrics::counter!("wagers_placed_total",
        "game" => game.to_string()
    )
    .increment(1);
}

/// Increment rejected wagers counter.
pub fn wagers_rejected_total(reason: &str) {
    metrics::counter!("wagers_rejected_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Increment resolved wagers counter.
pub fn wagers_resolved_total() {
    metrics::counter!("wagers_resolved_total").increment(1);
}

/// Record how long a wager took from request to commit, in milliseconds.
pub fn wager_commit_duration_ms(duration_ms: f64) {
    metrics::histogram!("wager_commit_duration_ms").record(duration_ms);
}

// ============================================================================
// VIP Metrics
// ============================================================================

/// Count VIP tiers granted.
pub fn vip_grants_total(count: usize) {
    metrics::counter!("vip_grants_total").increment(count as u64);
}

// ============================================================================
// Operator Metrics
// ============================================================================

/// Increment operator actions counter.
pub fn admin_actions_total(action: &str) {
    metrics::counter!("admin_actions_total",
        "action" => action.to_string()
    )
    .increment(1);
}
