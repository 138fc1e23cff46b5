//! HTTP API for the wagering ledger.
//!
//! # Modules
//!
//! - [`wagers`]: placing, resolving and looking up wagers
//! - [`accounts`]: account views and operator commands
//! - [`middleware`]: operator role extraction and request metrics
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health                                   - Store health (public)
//! POST /api/v1/wagers                            - Place a wager
//! GET  /api/v1/wagers/{wager_id}                 - Wager details
//! POST /api/v1/wagers/{wager_id}/resolve         - Settle a pending wager
//! GET  /api/v1/users/{user_id}/account           - Current account, never created here
//! GET  /api/v1/accounts/{account_id}             - Account details
//! GET  /api/v1/accounts/{account_id}/transactions
//! GET  /api/v1/accounts/{account_id}/audit
//! GET  /api/v1/accounts/{account_id}/perks
//! POST /api/v1/accounts/{account_id}/exclusions  - Hostess, admin, owner
//! POST /api/v1/accounts/{account_id}/adjustments - Admin, owner
//! POST /api/v1/accounts/{account_id}/state       - Admin, owner
//! POST /api/v1/transfers                         - Admin, owner
//! POST /api/v1/users/{user_id}/ban               - Admin, owner
//! POST /api/v1/users/{user_id}/reset             - Admin, owner
//! ```
//!
//! Operator endpoints read the caller's role from the `X-Operator-Role`
//! header; authenticating that header is the job of the gateway in front.
//!
//! Amounts travel as decimal strings (numbers are accepted on input) and are
//! never converted to floating point.

pub mod accounts;
pub mod middleware;
pub mod wagers;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use wager_ledger::{
    WagerEngine,
    account::AccountError,
    exclusion::ExclusionError,
    ledger::LedgerError,
    vip::VipError,
    wager::WagerError,
};

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WagerEngine>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of a turned-down wager
#[derive(Debug, Serialize)]
pub struct RejectionResponse {
    pub accepted: bool,
    pub reason: &'static str,
    pub error: String,
}

/// Every failure a handler can produce
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Wager(#[from] WagerError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Exclusion(#[from] ExclusionError),

    #[error(transparent)]
    Vip(#[from] VipError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Role {0} may not perform this action")]
    Forbidden(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Wager(e) => wager_status(e),
            ApiError::Ledger(e) => ledger_status(e),
            ApiError::Account(e) => account_status(e),
            ApiError::Exclusion(e) => match e {
                ExclusionError::AccountNotFound(_) => StatusCode::NOT_FOUND,
                ExclusionError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
                ExclusionError::Unauthorized => StatusCode::FORBIDDEN,
                ExclusionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Vip(VipError::Ledger(e)) => ledger_status(e),
            ApiError::Vip(VipError::InvalidSchedule(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Client-safe message; persistence details never leave the server
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Wager(e) => e.client_message(),
            ApiError::Ledger(e) => e.client_message(),
            ApiError::Account(e) => e.client_message(),
            ApiError::Exclusion(e) => e.client_message(),
            ApiError::Vip(VipError::Ledger(e)) => e.client_message(),
            ApiError::Vip(VipError::InvalidSchedule(_)) => "Internal server error".to_string(),
            ApiError::BadRequest(_) | ApiError::Forbidden(_) => self.to_string(),
        }
    }
}

fn wager_status(error: &WagerError) -> StatusCode {
    match error {
        WagerError::InvalidWager(_) => StatusCode::BAD_REQUEST,
        WagerError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        WagerError::Excluded { .. }
        | WagerError::AccountInactive(_)
        | WagerError::PermanentBan(_) => StatusCode::FORBIDDEN,
        WagerError::AccountNotFound(_) | WagerError::WagerNotFound(_) => StatusCode::NOT_FOUND,
        WagerError::WagerAlreadyComplete(_) | WagerError::ConcurrencyConflict { .. } => {
            StatusCode::CONFLICT
        }
        WagerError::ArithmeticOverflow => StatusCode::UNPROCESSABLE_ENTITY,
        WagerError::Account(e) => account_status(e),
        WagerError::Ledger(e) => ledger_status(e),
        WagerError::Exclusion(_) | WagerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ledger_status(error: &LedgerError) -> StatusCode {
    match error {
        LedgerError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::InvalidAmount(_) | LedgerError::SelfTransfer => StatusCode::BAD_REQUEST,
        LedgerError::InsufficientBalance { .. } | LedgerError::ArithmeticOverflow => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LedgerError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn account_status(error: &AccountError) -> StatusCode {
    match error {
        AccountError::AccountNotFound(_) | AccountError::NoActiveAccount(_) => {
            StatusCode::NOT_FOUND
        }
        AccountError::PermanentBan(_) => StatusCode::FORBIDDEN,
        AccountError::InvalidStateTransition { .. }
        | AccountError::ActiveAccountExists(_)
        | AccountError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        AccountError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, "Request failed: {}", self);
        }

        // Turned-down wagers keep the accepted/reason shape
        if let ApiError::Wager(e) = &self {
            if let Some(reason) = e.rejection_reason() {
                let body = RejectionResponse {
                    accepted: false,
                    reason,
                    error: e.client_message(),
                };
                return (status, Json(body)).into_response();
            }
        }

        let body = ErrorResponse {
            error: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router();

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(middleware::track_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router with all versioned endpoints.
fn create_v1_router() -> Router<AppState> {
    let gambler_routes = Router::new()
        .route("/wagers", post(wagers::place_wager))
        .route("/wagers/{wager_id}", get(wagers::get_wager))
        .route("/wagers/{wager_id}/resolve", post(wagers::resolve_wager))
        .route("/users/{user_id}/account", get(accounts::user_account))
        .route("/accounts/{account_id}", get(accounts::get_account))
        .route(
            "/accounts/{account_id}/transactions",
            get(accounts::transactions),
        )
        .route("/accounts/{account_id}/audit", get(accounts::audit))
        .route("/accounts/{account_id}/perks", get(accounts::perks));

    // Operator routes need a recognised X-Operator-Role
    let operator_routes = Router::new()
        .route(
            "/accounts/{account_id}/exclusions",
            post(accounts::exclude),
        )
        .route(
            "/accounts/{account_id}/adjustments",
            post(accounts::adjust),
        )
        .route("/accounts/{account_id}/state", post(accounts::set_state))
        .route("/transfers", post(accounts::transfer))
        .route("/users/{user_id}/ban", post(accounts::ban))
        .route("/users/{user_id}/reset", post(accounts::reset))
        .route_layer(axum::middleware::from_fn(middleware::operator_role));

    Router::new().merge(gambler_routes).merge(operator_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the store answers, `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:7070/health
/// # {"status":"healthy","store":true,"version":"0.1.0","timestamp":"2026-01-05T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = state.engine.store().health_check().await.is_ok();

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
