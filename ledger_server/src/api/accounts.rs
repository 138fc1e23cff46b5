//! Account API handlers: read-only views and operator commands.
//!
//! Operator commands require the `X-Operator-Role` header:
//! ```bash
//! curl -X POST http://localhost:7070/api/v1/accounts/1/exclusions \
//!   -H "X-Operator-Role: hostess" \
//!   -H "Content-Type: application/json" \
//!   -d '{"duration_secs": 3600}'
//! ```

use super::{
    ApiError, AppState,
    middleware::{require_admin, require_exclude},
};
use crate::{logging, metrics};
use axum::{
    Json,
    extract::{Extension, Path, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wager_ledger::{
    AccountState, EventSource, GamblerAccount, Role, Transaction,
    account::{AccountError, AccountId, UserId},
    exclusion::Exclusion,
    ledger::LedgerAudit,
    vip::VipPerk,
};

/// Account as shown to clients; the outcome seed is never exposed
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: AccountId,
    pub user_id: UserId,
    pub balance: Decimal,
    pub state: AccountState,
    pub total_wagered: Decimal,
    pub next_vip_wager_threshold: Option<Decimal>,
    pub vip_level: Option<String>,
    pub excluded_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ExcludeRequest {
    pub duration_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    pub effect: Decimal,
    #[serde(default = "default_adjustment_source")]
    pub event_source: EventSource,
    pub comment: Option<String>,
}

fn default_adjustment_source() -> EventSource {
    EventSource::Administrative
}

#[derive(Debug, Deserialize)]
pub struct StateRequest {
    pub state: AccountState,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub debit: Transaction,
    pub credit: Transaction,
}

async fn view(state: &AppState, account: GamblerAccount) -> Result<AccountView, ApiError> {
    let excluded_until = state
        .engine
        .exclusions()
        .active_exclusion(account.id)
        .await?
        .map(|exclusion| exclusion.expires_at);
    let vip_level = state
        .engine
        .vip()
        .tier_for(account.total_wagered)
        .map(|tier| format!("{} {}", tier.level, tier.tier));

    Ok(AccountView {
        id: account.id,
        user_id: account.user_id,
        balance: account.balance,
        state: account.state,
        total_wagered: account.total_wagered,
        next_vip_wager_threshold: account.next_vip_wager_threshold,
        vip_level,
        excluded_until,
        created_at: account.created_at,
    })
}

/// Current account of a user; never creates one.
///
/// # Errors
///
/// - `404 Not Found`: The user has no account yet
pub async fn user_account(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<AccountView>, ApiError> {
    let account = state
        .engine
        .accounts()
        .resolve_or_create(user_id, false)
        .await?
        .ok_or(AccountError::NoActiveAccount(user_id))?;

    Ok(Json(view(&state, account).await?))
}

/// Get account by ID.
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<AccountView>, ApiError> {
    let account = state.engine.accounts().get(account_id).await?;
    Ok(Json(view(&state, account).await?))
}

/// Transaction history, oldest first.
pub async fn transactions(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.engine.ledger().transactions(account_id).await?))
}

/// Check the account's balance and volume against its history.
pub async fn audit(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<LedgerAudit>, ApiError> {
    Ok(Json(state.engine.ledger().audit(account_id).await?))
}

/// VIP perks granted so far.
pub async fn perks(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Vec<VipPerk>>, ApiError> {
    state.engine.accounts().get(account_id).await?;
    Ok(Json(state.engine.vip().perks(account_id).await?))
}

/// Put an account on a betting break. Hostess, admin or owner.
pub async fn exclude(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    Path(account_id): Path<AccountId>,
    Json(request): Json<ExcludeRequest>,
) -> Result<Json<Exclusion>, ApiError> {
    require_exclude(role)?;

    let duration = chrono::TimeDelta::try_seconds(request.duration_secs)
        .ok_or_else(|| ApiError::BadRequest("duration_secs is out of range".to_string()))?;

    let exclusion = state
        .engine
        .exclusions()
        .exclude_as(role, account_id, duration)
        .await?;

    metrics::admin_actions_total("exclude");
    logging::log_admin_action(
        "exclude",
        role.as_str(),
        account_id,
        &format!("Excluded until {}", exclusion.expires_at),
    );
    Ok(Json(exclusion))
}

/// Apply a manual balance adjustment. Admin or owner.
pub async fn adjust(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    Path(account_id): Path<AccountId>,
    Json(request): Json<AdjustmentRequest>,
) -> Result<Json<Transaction>, ApiError> {
    require_admin(role)?;

    if request.effect == Decimal::ZERO {
        return Err(ApiError::BadRequest("effect must not be zero".to_string()));
    }
    if request.event_source == EventSource::Gambling {
        return Err(ApiError::BadRequest(
            "gambling effects go through wagers".to_string(),
        ));
    }

    let transaction = state
        .engine
        .ledger()
        .apply_effect(
            account_id,
            request.effect,
            request.event_source,
            request.comment,
            None,
        )
        .await?;

    metrics::admin_actions_total("adjust");
    logging::log_admin_action(
        "adjust",
        role.as_str(),
        account_id,
        &format!(
            "Applied {} ({}), balance now {}",
            transaction.effect, transaction.event_source, transaction.new_balance
        ),
    );
    Ok(Json(transaction))
}

/// Move an account through its lifecycle. Admin or owner.
pub async fn set_state(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    Path(account_id): Path<AccountId>,
    Json(request): Json<StateRequest>,
) -> Result<Json<AccountView>, ApiError> {
    require_admin(role)?;

    let account = state
        .engine
        .accounts()
        .transition(account_id, request.state)
        .await?;

    metrics::admin_actions_total("set_state");
    logging::log_admin_action(
        "set_state",
        role.as_str(),
        account_id,
        &format!("Account is now {}", account.state),
    );
    Ok(Json(view(&state, account).await?))
}

/// Move funds between two accounts. Admin or owner.
pub async fn transfer(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    require_admin(role)?;

    let (debit, credit) = state
        .engine
        .ledger()
        .transfer(
            request.from_account_id,
            request.to_account_id,
            request.amount,
            request.comment,
        )
        .await?;

    metrics::admin_actions_total("transfer");
    logging::log_admin_action(
        "transfer",
        role.as_str(),
        request.from_account_id,
        &format!("Sent {} to account {}", request.amount, request.to_account_id),
    );
    Ok(Json(TransferResponse { debit, credit }))
}

/// Ban a user for good. Admin or owner.
pub async fn ban(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    Path(user_id): Path<UserId>,
) -> Result<Json<AccountView>, ApiError> {
    require_admin(role)?;

    let account = state.engine.accounts().permanently_ban(user_id).await?;

    metrics::admin_actions_total("ban");
    logging::log_admin_action("ban", role.as_str(), user_id, "User permanently banned");
    Ok(Json(view(&state, account).await?))
}

/// Abandon the user's account and open a fresh one. Admin or owner.
pub async fn reset(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    Path(user_id): Path<UserId>,
) -> Result<Json<AccountView>, ApiError> {
    require_admin(role)?;

    let account = state.engine.accounts().reset(user_id).await?;

    metrics::admin_actions_total("reset");
    logging::log_admin_action(
        "reset",
        role.as_str(),
        user_id,
        &format!("Fresh account {}", account.id),
    );
    Ok(Json(view(&state, account).await?))
}
