//! Wager API handlers.
//!
//! Place a completed wager:
//! ```bash
//! curl -X POST http://localhost:7070/api/v1/wagers \
//!   -H "Content-Type: application/json" \
//!   -d '{"user_id": 42, "amount": "100", "outcome_effect": "200", "game": "dice"}'
//! ```
//!
//! Settle a pending one:
//! ```bash
//! curl -X POST http://localhost:7070/api/v1/wagers/<wager_id>/resolve \
//!   -H "Content-Type: application/json" \
//!   -d '{"final_effect": "20"}'
//! ```

use super::{ApiError, AppState};
use crate::{logging, metrics};
use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;
use wager_ledger::{
    account::{AccountId, UserId},
    vip::VipPerk,
    wager::{Game, PlaceWager, PlacedWager, Wager},
};

#[derive(Debug, Deserialize)]
pub struct PlaceWagerRequest {
    pub user_id: UserId,
    pub amount: Decimal,
    /// Net effect of the outcome; ignored for pending wagers
    #[serde(default)]
    pub outcome_effect: Decimal,
    pub game: Game,
    #[serde(default = "default_complete")]
    pub is_complete: bool,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

fn default_complete() -> bool {
    true
}

impl From<PlaceWagerRequest> for PlaceWager {
    fn from(request: PlaceWagerRequest) -> Self {
        PlaceWager {
            amount: request.amount,
            outcome_effect: request.outcome_effect,
            game: request.game,
            is_complete: request.is_complete,
            meta: request.meta,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveWagerRequest {
    pub final_effect: Decimal,
}

/// Body of an accepted wager
#[derive(Debug, Serialize)]
pub struct WagerAccepted {
    pub accepted: bool,
    pub wager_id: Uuid,
    pub account_id: AccountId,
    pub balance_after: Decimal,
    pub multiplier: Decimal,
    pub outcome_description: String,
    pub vip_perks: Vec<VipPerk>,
}

impl From<PlacedWager> for WagerAccepted {
    fn from(placed: PlacedWager) -> Self {
        WagerAccepted {
            accepted: true,
            wager_id: placed.wager.id,
            account_id: placed.wager.account_id,
            balance_after: placed.balance_after,
            multiplier: placed.wager.multiplier,
            outcome_description: placed.wager.outcome_description(),
            vip_perks: placed.vip_perks,
        }
    }
}

/// Place a wager for a user, opening their account on first contact.
///
/// # Response
///
/// Returns `200 OK` when accepted:
/// ```json
/// {
///   "accepted": true,
///   "wager_id": "6f1c...",
///   "account_id": 1,
///   "balance_after": "1200",
///   "multiplier": "3",
///   "outcome_description": "Won 200 on dice (3x)",
///   "vip_perks": []
/// }
/// ```
///
/// # Errors
///
/// Turned-down wagers answer `{"accepted": false, "reason": ...}` with
/// - `400 Bad Request`: `InvalidWager`
/// - `403 Forbidden`: `Excluded`, `AccountInactive`, `PermanentBan`
/// - `422 Unprocessable Entity`: `InsufficientBalance`
pub async fn place_wager(
    State(state): State<AppState>,
    Json(request): Json<PlaceWagerRequest>,
) -> Result<Json<WagerAccepted>, ApiError> {
    let user_id = request.user_id;
    let amount = request.amount;
    let game = request.game;
    let start = Instant::now();

    match state.engine.place_for_user(user_id, request.into()).await {
        Ok(placed) => {
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            metrics::wagers_placed_total(game.as_str());
            metrics::wager_commit_duration_ms(duration_ms);
            if !placed.vip_perks.is_empty() {
                metrics::vip_grants_total(placed.vip_perks.len());
            }

            let accepted = WagerAccepted::from(placed);
            logging::log_wager_event(
                "placed",
                Some(user_id),
                Some(accepted.wager_id),
                amount,
                &accepted.outcome_description,
            );
            Ok(Json(accepted))
        }
        Err(e) => {
            if let Some(reason) = e.rejection_reason() {
                metrics::wagers_rejected_total(reason);
                logging::log_wager_event("rejected", Some(user_id), None, amount, reason);
            }
            Err(e.into())
        }
    }
}

/// Settle a pending wager with its final net effect.
///
/// # Errors
///
/// - `404 Not Found`: Unknown wager
/// - `409 Conflict`: Wager already complete
/// - `400 Bad Request`: Loss larger than the stake
pub async fn resolve_wager(
    State(state): State<AppState>,
    Path(wager_id): Path<Uuid>,
    Json(request): Json<ResolveWagerRequest>,
) -> Result<Json<WagerAccepted>, ApiError> {
    let resolved = state
        .engine
        .resolve_incomplete_wager(wager_id, request.final_effect)
        .await?;

    metrics::wagers_resolved_total();
    logging::log_wager_event(
        "resolved",
        None,
        Some(wager_id),
        request.final_effect,
        &resolved.wager.outcome_description(),
    );

    Ok(Json(WagerAccepted::from(resolved)))
}

/// Get a wager by ID.
pub async fn get_wager(
    State(state): State<AppState>,
    Path(wager_id): Path<Uuid>,
) -> Result<Json<Wager>, ApiError> {
    Ok(Json(state.engine.wager(wager_id).await?))
}
