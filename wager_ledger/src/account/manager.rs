//! Gambler account manager: user to account resolution and the account lifecycle.

use super::{
    errors::{AccountError, AccountResult},
    models::{AccountId, AccountState, GamblerAccount, UserId},
};
use crate::{
    config::LedgerConfig,
    db::{LedgerStore, NewAccount, StoreError},
    ledger::{EventSource, NewTransaction},
    locks::AccountLocks,
    rng::DeterministicRng,
};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Comment on the transaction crediting a new account's initial balance
pub const OPENING_BALANCE_COMMENT: &str = "Opening balance";

/// Accounts that can no longer be used but do not block a fresh one
fn is_closed(state: AccountState) -> bool {
    matches!(state, AccountState::Abandoned | AccountState::Liquidated)
}

/// Gambler account manager
#[derive(Clone)]
pub struct GamblerAccountManager {
    store: Arc<dyn LedgerStore>,
    locks: AccountLocks,
    /// Keyed by user id: creation, bans and resets of one user run one at a time
    user_locks: AccountLocks,
    initial_balance: Decimal,
    first_vip_threshold: Option<Decimal>,
    max_commit_retries: u32,
}

impl GamblerAccountManager {
    /// Create a new account manager
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence backend
    /// * `locks` - Lock table shared with the ledger
    /// * `config` - Initial balance, VIP schedule and retry settings
    pub fn new(store: Arc<dyn LedgerStore>, locks: AccountLocks, config: &LedgerConfig) -> Self {
        Self {
            store,
            locks,
            user_locks: AccountLocks::new(),
            initial_balance: config.initial_balance,
            first_vip_threshold: config.vip_schedule.first_threshold(),
            max_commit_retries: config.max_commit_retries.max(1),
        }
    }

    /// Find the user's current account, creating one if asked to.
    ///
    /// The current account is the newest one that is not permanently banned.
    /// When that account is abandoned or liquidated (or there is none) and
    /// `create_if_missing` is set, a fresh account is created. Concurrent
    /// first contact creates exactly one account: the loser of the race
    /// returns the winner's. The store refuses the insert for a banned user
    /// in the same step that writes it.
    ///
    /// # Errors
    ///
    /// * `AccountError::PermanentBan` - A new account is needed but the user is banned
    pub async fn resolve_or_create(
        &self,
        user_id: UserId,
        create_if_missing: bool,
    ) -> AccountResult<Option<GamblerAccount>> {
        match self.store.newest_account(user_id).await? {
            Some(account) if !is_closed(account.state) => return Ok(Some(account)),
            newest if !create_if_missing => return Ok(newest),
            _ => {}
        }

        let _guard = self.user_locks.lock(user_id).await;

        // Re-read under the user lock; a racing creation or ban may have landed
        match self.store.newest_account(user_id).await? {
            Some(account) if !is_closed(account.state) => return Ok(Some(account)),
            _ => {}
        }

        match self.store.insert_account(self.new_account(user_id)).await {
            Ok(account) => {
                info!(
                    "Created account {} for user {} with balance {}",
                    account.id, user_id, account.balance
                );
                Ok(Some(account))
            }
            Err(StoreError::ActiveAccountExists { .. }) => {
                debug!("Lost account creation race for user {user_id}, using the winner");
                Ok(self.store.newest_account(user_id).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get account by ID
    pub async fn get(&self, account_id: AccountId) -> AccountResult<GamblerAccount> {
        self.store
            .account(account_id)
            .await?
            .ok_or(AccountError::AccountNotFound(account_id))
    }

    /// Every account the user ever had, oldest first
    pub async fn accounts(&self, user_id: UserId) -> AccountResult<Vec<GamblerAccount>> {
        Ok(self.store.accounts_for_user(user_id).await?)
    }

    /// Move an account through its lifecycle
    ///
    /// # Errors
    ///
    /// * `AccountError::InvalidStateTransition` - The lifecycle forbids the move
    /// * `AccountError::ActiveAccountExists` - Reactivating while another account is active
    pub async fn transition(
        &self,
        account_id: AccountId,
        new_state: AccountState,
    ) -> AccountResult<GamblerAccount> {
        let _guard = self.locks.lock(account_id).await;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let account = self.get(account_id).await?;
            if !account.state.can_transition_to(new_state) {
                return Err(AccountError::InvalidStateTransition {
                    from: account.state,
                    to: new_state,
                });
            }

            match self
                .store
                .set_state(account_id, account.version, new_state)
                .await
            {
                Ok(updated) => {
                    info!(
                        "Account {account_id} moved from {} to {new_state}",
                        account.state
                    );
                    return Ok(updated);
                }
                Err(StoreError::ActiveAccountExists { user_id }) => {
                    return Err(AccountError::ActiveAccountExists(user_id));
                }
                Err(e) if e.is_retryable() && attempt < self.max_commit_retries => {
                    debug!("State change of account {account_id} conflicted, retrying");
                }
                Err(e) if e.is_retryable() => {
                    warn!("Giving up state change of account {account_id} after {attempt} attempts");
                    return Err(AccountError::ConcurrencyConflict { attempts: attempt });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Ban a user for good.
    ///
    /// Bans the user's current account; a user without one gets an empty
    /// banned account so the ban still blocks future creation.
    pub async fn permanently_ban(&self, user_id: UserId) -> AccountResult<GamblerAccount> {
        let _guard = self.user_locks.lock(user_id).await;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let result = match self.store.newest_account(user_id).await? {
                Some(account) => {
                    self.transition(account.id, AccountState::PermanentlyBanned)
                        .await
                }
                None => {
                    let tombstone = NewAccount {
                        user_id,
                        state: AccountState::PermanentlyBanned,
                        random_seed: DeterministicRng::generate_seed(),
                        next_vip_wager_threshold: None,
                        opening_transaction: None,
                        replaces: None,
                    };
                    self.store.insert_account(tombstone).await.map_err(Into::into)
                }
            };

            match result {
                Ok(banned) => {
                    info!("User {user_id} permanently banned (account {})", banned.id);
                    return Ok(banned);
                }
                // Another process opened an account meanwhile; ban that one instead
                Err(AccountError::Store(StoreError::ActiveAccountExists { .. }))
                    if attempt < self.max_commit_retries =>
                {
                    debug!("User {user_id} gained an account while being banned, retrying");
                }
                Err(AccountError::Store(StoreError::ActiveAccountExists { .. })) => {
                    return Err(AccountError::ConcurrencyConflict { attempts: attempt });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Abandon the user's active account; the next resolution creates a fresh one
    pub async fn abandon(&self, user_id: UserId) -> AccountResult<GamblerAccount> {
        let account = self.active_account(user_id).await?;
        self.transition(account.id, AccountState::Abandoned).await
    }

    /// Abandon the active account and open a fresh one in a single write
    pub async fn reset(&self, user_id: UserId) -> AccountResult<GamblerAccount> {
        let _user_guard = self.user_locks.lock(user_id).await;
        let current = self.active_account(user_id).await?;
        let _guard = self.locks.lock(current.id).await;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let account = self.get(current.id).await?;
            if !account.is_active() {
                return Err(AccountError::NoActiveAccount(user_id));
            }

            let mut replacement = self.new_account(user_id);
            replacement.replaces = Some((account.id, account.version));

            match self.store.insert_account(replacement).await {
                Ok(created) => {
                    info!(
                        "Reset user {user_id}: account {} abandoned, account {} opened",
                        account.id, created.id
                    );
                    return Ok(created);
                }
                Err(e) if e.is_retryable() && attempt < self.max_commit_retries => {
                    debug!("Reset of user {user_id} conflicted, retrying");
                }
                Err(e) if e.is_retryable() => {
                    return Err(AccountError::ConcurrencyConflict { attempts: attempt });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn active_account(&self, user_id: UserId) -> AccountResult<GamblerAccount> {
        self.store
            .newest_account(user_id)
            .await?
            .filter(GamblerAccount::is_active)
            .ok_or(AccountError::NoActiveAccount(user_id))
    }

    fn new_account(&self, user_id: UserId) -> NewAccount {
        let opening_transaction = (self.initial_balance != Decimal::ZERO).then(|| NewTransaction {
            event_source: EventSource::Other,
            effect: self.initial_balance,
            new_balance: self.initial_balance,
            comment: Some(OPENING_BALANCE_COMMENT.to_string()),
            counterparty_account_id: None,
        });

        NewAccount {
            user_id,
            state: AccountState::Active,
            random_seed: DeterministicRng::generate_seed(),
            next_vip_wager_threshold: self.first_vip_threshold,
            opening_transaction,
            replaces: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryLedgerStore;

    fn manager() -> GamblerAccountManager {
        GamblerAccountManager::new(
            Arc::new(MemoryLedgerStore::new()),
            AccountLocks::new(),
            &LedgerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let manager = manager();

        assert!(manager.resolve_or_create(1, false).await.unwrap().is_none());

        let account = manager.resolve_or_create(1, true).await.unwrap().unwrap();
        assert_eq!(account.balance, Decimal::from(1000));
        assert_eq!(account.state, AccountState::Active);
        assert_eq!(account.next_vip_wager_threshold, Some(Decimal::from(1000)));
        assert_eq!(account.random_seed.len(), 64);

        let again = manager.resolve_or_create(1, true).await.unwrap().unwrap();
        assert_eq!(again.id, account.id);
    }

    #[tokio::test]
    async fn test_ban_blocks_creation() {
        let manager = manager();
        manager.resolve_or_create(1, true).await.unwrap();

        let banned = manager.permanently_ban(1).await.unwrap();
        assert_eq!(banned.state, AccountState::PermanentlyBanned);

        assert!(manager.resolve_or_create(1, false).await.unwrap().is_none());
        assert!(matches!(
            manager.resolve_or_create(1, true).await,
            Err(AccountError::PermanentBan(1))
        ));
    }

    #[tokio::test]
    async fn test_ban_without_account_leaves_tombstone() {
        let manager = manager();

        let tombstone = manager.permanently_ban(5).await.unwrap();
        assert_eq!(tombstone.balance, Decimal::ZERO);
        assert!(matches!(
            manager.resolve_or_create(5, true).await,
            Err(AccountError::PermanentBan(5))
        ));
    }

    #[tokio::test]
    async fn test_invalid_transition() {
        let manager = manager();
        let account = manager.resolve_or_create(1, true).await.unwrap().unwrap();
        manager.transition(account.id, AccountState::Liquidated).await.unwrap();

        let result = manager.transition(account.id, AccountState::Active).await;
        assert!(matches!(
            result,
            Err(AccountError::InvalidStateTransition {
                from: AccountState::Liquidated,
                to: AccountState::Active
            })
        ));
    }

    #[tokio::test]
    async fn test_disabled_account_is_still_current() {
        let manager = manager();
        let account = manager.resolve_or_create(1, true).await.unwrap().unwrap();
        manager
            .transition(account.id, AccountState::AdministrativelyDisabled)
            .await
            .unwrap();

        let current = manager.resolve_or_create(1, true).await.unwrap().unwrap();
        assert_eq!(current.id, account.id);
        assert!(!current.is_active());
    }

    #[tokio::test]
    async fn test_reset_replaces_account() {
        let manager = manager();
        let old = manager.resolve_or_create(1, true).await.unwrap().unwrap();

        let new = manager.reset(1).await.unwrap();
        assert_ne!(new.id, old.id);
        assert_eq!(manager.get(old.id).await.unwrap().state, AccountState::Abandoned);
        assert_eq!(manager.accounts(1).await.unwrap().len(), 2);
    }
}
