//! Request middleware: operator roles and request metrics.
//!
//! Operator endpoints read the caller's [`Role`] from the `X-Operator-Role`
//! header and place it in the request extensions:
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use wager_ledger::Role;
//!
//! async fn operator_handler(Extension(role): Extension<Role>) -> String {
//!     format!("Acting as {}", role)
//! }
//! # let _ = operator_handler;
//! ```

use super::ApiError;
use crate::{logging, metrics};
use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use wager_ledger::Role;

/// Header carrying the caller's role
pub const OPERATOR_ROLE_HEADER: &str = "x-operator-role";

/// Parse the role header into a [`Role`] extension.
///
/// # Behavior
///
/// - **Known role**: Injects `Role` into request extensions and calls the next handler
/// - **Missing header**: Returns `401 Unauthorized`
/// - **Unknown role**: Returns `400 Bad Request`; roles are never guessed
pub async fn operator_role(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let header = request
        .headers()
        .get(OPERATOR_ROLE_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let role = header
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse::<Role>().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;

    request.extensions_mut().insert(role);
    Ok(next.run(request).await)
}

/// Count and time every request
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    metrics::http_requests_total(&method, &path, response.status().as_u16());
    logging::log_performance(&path, duration_ms, Some(&method));

    response
}

/// Fail unless `role` may exclude gamblers
pub fn require_exclude(role: Role) -> Result<(), ApiError> {
    if role.can_exclude() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(role.as_str()))
    }
}

/// Fail unless `role` may administer accounts
pub fn require_admin(role: Role) -> Result<(), ApiError> {
    if role.can_administer() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(role.as_str()))
    }
}
