//! Wager engine: places and resolves wagers against the ledger.

use super::{
    errors::{WagerError, WagerResult},
    models::{NewWager, PlaceWager, PlacedWager, Wager, WagerRequest, derive_multiplier},
};
use crate::{
    account::{AccountError, AccountId, AccountState, GamblerAccountManager, UserId},
    config::LedgerConfig,
    db::{LedgerStore, StoreError, WagerWrite},
    exclusion::ExclusionManager,
    ledger::{BalanceLedger, EventSource},
    locks::AccountLocks,
    vip::{VipPerk, VipProgressionEngine},
};
use log::{debug, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

fn wager_comment(wager_id: Uuid) -> String {
    format!("Win/loss from wager {wager_id}")
}

/// Wager engine, wiring the ledger components over one store
#[derive(Clone)]
pub struct WagerEngine {
    store: Arc<dyn LedgerStore>,
    ledger: BalanceLedger,
    accounts: GamblerAccountManager,
    exclusions: ExclusionManager,
    vip: VipProgressionEngine,
}

impl WagerEngine {
    /// Create a new wager engine
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence backend shared by every component
    /// * `config` - Ledger configuration
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        let locks = AccountLocks::new();
        let ledger = BalanceLedger::new(store.clone(), locks.clone(), &config);
        let accounts = GamblerAccountManager::new(store.clone(), locks, &config);
        let exclusions = ExclusionManager::new(store.clone());
        let vip = VipProgressionEngine::new(ledger.clone(), config.vip_schedule);

        Self {
            store,
            ledger,
            accounts,
            exclusions,
            vip,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    pub fn accounts(&self) -> &GamblerAccountManager {
        &self.accounts
    }

    pub fn exclusions(&self) -> &ExclusionManager {
        &self.exclusions
    }

    pub fn vip(&self) -> &VipProgressionEngine {
        &self.vip
    }

    /// Place a wager whose outcome the game layer has already decided.
    ///
    /// Checks run in order: positive amount, no exclusion in force, active
    /// account, stake covered by the balance. The last two are checked under
    /// the account lock in the same commit that writes the wager, its
    /// transaction and the new balance, so concurrent wagers cannot overdraw.
    /// An incomplete wager holds the stake (`effect = -amount`) until resolved.
    ///
    /// `balance_after` is the balance right after the wager; VIP bonuses the
    /// wager unlocked are granted afterwards and reported in `vip_perks`.
    ///
    /// # Errors
    ///
    /// * `WagerError::InvalidWager` - Amount not positive, or a loss larger than the stake
    /// * `WagerError::Excluded` - Betting break in force
    /// * `WagerError::AccountInactive` - Account not active
    /// * `WagerError::PermanentBan` - Account banned, possibly while the wager was in flight
    /// * `WagerError::InsufficientBalance` - Stake exceeds balance
    pub async fn place_wager(&self, request: WagerRequest) -> WagerResult<PlacedWager> {
        let WagerRequest { account_id, wager } = request;
        let PlaceWager {
            amount,
            outcome_effect,
            game,
            is_complete,
            meta,
        } = wager;

        if amount <= Decimal::ZERO {
            return Err(WagerError::InvalidWager(format!(
                "amount must be positive, got {amount}"
            )));
        }

        let effect = if is_complete { outcome_effect } else { -amount };
        if effect < -amount {
            return Err(WagerError::InvalidWager(format!(
                "loss {effect} exceeds stake {amount}"
            )));
        }

        if let Some(exclusion) = self.exclusions.active_exclusion(account_id).await? {
            warn!("Rejected wager on excluded account {account_id}");
            return Err(WagerError::Excluded {
                until: exclusion.expires_at,
            });
        }

        let multiplier =
            derive_multiplier(amount, effect, is_complete).ok_or(WagerError::ArithmeticOverflow)?;
        let wager_id = Uuid::new_v4();

        let committed = self
            .ledger
            .commit_with(account_id, |posting| {
                let account = posting.account();
                match account.state {
                    AccountState::Active => {}
                    AccountState::PermanentlyBanned => {
                        return Err(WagerError::PermanentBan(account.user_id));
                    }
                    state => return Err(WagerError::AccountInactive(state)),
                }

                posting.require_funds(amount)?;
                posting.add_wagered(amount)?;
                posting.post(
                    effect,
                    EventSource::Gambling,
                    Some(wager_comment(wager_id)),
                    None,
                )?;
                posting.record_wager(WagerWrite::Insert(NewWager {
                    id: wager_id,
                    wager_amount: amount,
                    wager_effect: effect,
                    game,
                    multiplier,
                    game_meta: meta.clone(),
                    is_complete,
                }));
                Ok(())
            })
            .await?;

        let account = committed.account;
        let wager = single_wager(committed.receipt.wagers)?;
        let transaction = committed.receipt.transactions.into_iter().next();

        debug!(
            "Account {account_id} wagered {amount} on {game} with effect {effect}, balance now {}",
            account.balance
        );

        let vip_due = account
            .next_vip_wager_threshold
            .is_some_and(|threshold| account.total_wagered >= threshold);
        let vip_perks = if vip_due {
            self.grant_vip(account_id).await
        } else {
            Vec::new()
        };

        Ok(PlacedWager {
            balance_after: account.balance,
            wager,
            transaction,
            account,
            vip_perks,
        })
    }

    /// Runs outside the wager's lock; a failure here never undoes the wager
    async fn grant_vip(&self, account_id: AccountId) -> Vec<VipPerk> {
        match self.vip.check(account_id).await {
            Ok(perks) => perks,
            Err(e) => {
                warn!("VIP check failed for account {account_id}: {e}");
                Vec::new()
            }
        }
    }

    /// Settle a pending wager.
    ///
    /// The stake was debited when the wager was placed, so the balance moves
    /// by `final_effect + amount`; the net effect of the wager ends up being
    /// `final_effect`.
    ///
    /// # Errors
    ///
    /// * `WagerError::WagerNotFound` - Unknown wager
    /// * `WagerError::WagerAlreadyComplete` - Already settled
    /// * `WagerError::InvalidWager` - Loss larger than the stake
    pub async fn resolve_incomplete_wager(
        &self,
        wager_id: Uuid,
        final_effect: Decimal,
    ) -> WagerResult<PlacedWager> {
        let wager = self
            .store
            .wager(wager_id)
            .await?
            .ok_or(WagerError::WagerNotFound(wager_id))?;

        if wager.is_complete {
            return Err(WagerError::WagerAlreadyComplete(wager_id));
        }

        let amount = wager.wager_amount;
        if final_effect < -amount {
            return Err(WagerError::InvalidWager(format!(
                "loss {final_effect} exceeds stake {amount}"
            )));
        }

        let multiplier =
            derive_multiplier(amount, final_effect, true).ok_or(WagerError::ArithmeticOverflow)?;
        let delta = final_effect
            .checked_add(amount)
            .ok_or(WagerError::ArithmeticOverflow)?;

        let committed = self
            .ledger
            .commit_with(wager.account_id, |posting| {
                posting.record_wager(WagerWrite::Complete {
                    wager_id,
                    wager_effect: final_effect,
                    multiplier,
                });
                if delta != Decimal::ZERO {
                    posting.post(delta, EventSource::Gambling, Some(wager_comment(wager_id)), None)?;
                }
                Ok::<_, WagerError>(())
            })
            .await?;

        debug!(
            "Resolved wager {wager_id} with effect {final_effect}, balance now {}",
            committed.account.balance
        );

        Ok(PlacedWager {
            balance_after: committed.account.balance,
            wager: single_wager(committed.receipt.wagers)?,
            transaction: committed.receipt.transactions.into_iter().next(),
            account: committed.account,
            vip_perks: Vec::new(),
        })
    }

    /// Place a wager for a platform user, creating their account on first contact
    ///
    /// # Errors
    ///
    /// * `WagerError::PermanentBan` - The user is banned
    /// * Every error of [`place_wager`](Self::place_wager)
    pub async fn place_for_user(
        &self,
        user_id: UserId,
        wager: PlaceWager,
    ) -> WagerResult<PlacedWager> {
        let account = self
            .accounts
            .resolve_or_create(user_id, true)
            .await?
            .ok_or(AccountError::NoActiveAccount(user_id))?;

        if !account.is_active() && self.store.has_permanent_ban(user_id).await? {
            return Err(WagerError::PermanentBan(user_id));
        }

        self.place_wager(WagerRequest {
            account_id: account.id,
            wager,
        })
        .await
    }

    /// Find wager by ID
    pub async fn wager(&self, wager_id: Uuid) -> WagerResult<Wager> {
        self.store
            .wager(wager_id)
            .await?
            .ok_or(WagerError::WagerNotFound(wager_id))
    }
}

fn single_wager(wagers: Vec<Wager>) -> WagerResult<Wager> {
    wagers
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::Corrupt("commit returned no wager".to_string()).into())
}
