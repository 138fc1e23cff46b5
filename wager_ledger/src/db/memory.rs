//! In-memory [`LedgerStore`] for tests, benchmarks and `--memory` servers.
//!
//! All state sits behind one mutex, so every method is atomic with respect to
//! every other; version checks still apply exactly as in PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::errors::{StoreError, StoreResult};
use super::repository::{
    AccountWrite, CommitBatch, CommitReceipt, LedgerStore, NewAccount, WagerWrite,
};
use crate::account::{AccountId, AccountState, GamblerAccount, UserId};
use crate::exclusion::{Exclusion, NewExclusion};
use crate::ledger::{NewTransaction, Transaction};
use crate::vip::VipPerk;
use crate::wager::Wager;

#[derive(Default)]
struct State {
    accounts: BTreeMap<AccountId, GamblerAccount>,
    transactions: Vec<Transaction>,
    wagers: Vec<Wager>,
    wager_index: HashMap<Uuid, usize>,
    exclusions: Vec<Exclusion>,
    perks: Vec<VipPerk>,
    next_account_id: AccountId,
    next_transaction_id: i64,
    next_exclusion_id: i64,
    next_perk_id: i64,
}

impl State {
    fn account_mut(&mut self, account_id: AccountId) -> StoreResult<&mut GamblerAccount> {
        self.accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {account_id}")))
    }

    fn check_version(&self, account_id: AccountId, expected_version: i64) -> StoreResult<()> {
        let account = self
            .accounts
            .get(&account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {account_id}")))?;

        if account.version != expected_version {
            return Err(StoreError::VersionConflict { account_id });
        }
        Ok(())
    }

    fn has_other_active(&self, user_id: UserId, except: Option<AccountId>) -> bool {
        self.accounts.values().any(|account| {
            account.user_id == user_id
                && account.state == AccountState::Active
                && Some(account.id) != except
        })
    }

    fn is_banned(&self, user_id: UserId) -> bool {
        self.accounts.values().any(|account| {
            account.user_id == user_id && account.state == AccountState::PermanentlyBanned
        })
    }

    fn append_transaction(&mut self, account_id: AccountId, tx: NewTransaction) -> Transaction {
        self.next_transaction_id += 1;
        let transaction = Transaction {
            id: self.next_transaction_id,
            account_id,
            event_source: tx.event_source,
            effect: tx.effect,
            new_balance: tx.new_balance,
            comment: tx.comment,
            counterparty_account_id: tx.counterparty_account_id,
            created_at: Utc::now(),
        };
        self.transactions.push(transaction.clone());
        transaction
    }

    /// Every precondition of a batch, checked before anything is written
    fn validate(&self, batch: &CommitBatch) -> StoreResult<()> {
        let mut seen = HashSet::new();

        for write in &batch.writes {
            if !seen.insert(write.account_id) {
                return Err(StoreError::Corrupt(format!(
                    "account {} written twice in one commit",
                    write.account_id
                )));
            }
            self.check_version(write.account_id, write.expected_version)?;

            match &write.wager {
                Some(WagerWrite::Insert(wager)) => {
                    if self.wager_index.contains_key(&wager.id) {
                        return Err(StoreError::Corrupt(format!("duplicate wager {}", wager.id)));
                    }
                }
                Some(WagerWrite::Complete { wager_id, .. }) => {
                    let wager = self
                        .wager_index
                        .get(wager_id)
                        .map(|&index| &self.wagers[index])
                        .filter(|wager| wager.account_id == write.account_id)
                        .ok_or_else(|| StoreError::NotFound(format!("wager {wager_id}")))?;

                    if wager.is_complete {
                        return Err(StoreError::StaleWager(*wager_id));
                    }
                }
                None => {}
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: AccountWrite, receipt: &mut CommitReceipt) -> StoreResult<()> {
        let account_id = write.account_id;

        let account = self.account_mut(account_id)?;
        account.balance = write.balance;
        account.total_wagered = write.total_wagered;
        account.next_vip_wager_threshold = write.next_vip_wager_threshold;
        account.version += 1;
        receipt.accounts.push(account.clone());

        match write.wager {
            Some(WagerWrite::Insert(new)) => {
                let wager = Wager {
                    id: new.id,
                    account_id,
                    wager_amount: new.wager_amount,
                    wager_effect: new.wager_effect,
                    game: new.game,
                    multiplier: new.multiplier,
                    game_meta: new.game_meta,
                    is_complete: new.is_complete,
                    created_at: Utc::now(),
                };
                self.wager_index.insert(wager.id, self.wagers.len());
                self.wagers.push(wager.clone());
                receipt.wagers.push(wager);
            }
            Some(WagerWrite::Complete {
                wager_id,
                wager_effect,
                multiplier,
            }) => {
                let index = *self
                    .wager_index
                    .get(&wager_id)
                    .ok_or_else(|| StoreError::NotFound(format!("wager {wager_id}")))?;
                let wager = &mut self.wagers[index];
                wager.wager_effect = wager_effect;
                wager.multiplier = multiplier;
                wager.is_complete = true;
                receipt.wagers.push(wager.clone());
            }
            None => {}
        }

        for tx in write.transactions {
            let transaction = self.append_transaction(account_id, tx);
            receipt.transactions.push(transaction);
        }

        for perk in write.perks {
            self.next_perk_id += 1;
            let perk = VipPerk {
                id: self.next_perk_id,
                account_id,
                level: perk.level,
                tier: perk.tier,
                wager_threshold: perk.wager_threshold,
                payout: perk.payout,
                created_at: Utc::now(),
            };
            self.perks.push(perk.clone());
            receipt.perks.push(perk);
        }

        Ok(())
    }
}

/// Mutex-guarded in-memory store
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<State>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic mid-write leaves no partial batch behind: batches are validated first
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_account(&self, account: NewAccount) -> StoreResult<GamblerAccount> {
        let mut state = self.state();

        let replaced = account.replaces.map(|(id, _)| id);
        if let Some((replaced_id, expected_version)) = account.replaces {
            state.check_version(replaced_id, expected_version)?;
        }
        match account.state {
            AccountState::Active if state.is_banned(account.user_id) => {
                return Err(StoreError::UserBanned {
                    user_id: account.user_id,
                });
            }
            // A tombstone is only for users without a live account
            AccountState::Active | AccountState::PermanentlyBanned
                if state.has_other_active(account.user_id, replaced) =>
            {
                return Err(StoreError::ActiveAccountExists {
                    user_id: account.user_id,
                });
            }
            _ => {}
        }

        if let Some(replaced_id) = replaced {
            let old = state.account_mut(replaced_id)?;
            old.state = AccountState::Abandoned;
            old.version += 1;
        }

        state.next_account_id += 1;
        let id = state.next_account_id;
        let balance = account
            .opening_transaction
            .as_ref()
            .map_or(Decimal::ZERO, |tx| tx.new_balance);

        let created = GamblerAccount {
            id,
            user_id: account.user_id,
            balance,
            state: account.state,
            random_seed: account.random_seed,
            total_wagered: Decimal::ZERO,
            next_vip_wager_threshold: account.next_vip_wager_threshold,
            version: 0,
            created_at: Utc::now(),
        };
        state.accounts.insert(id, created.clone());

        if let Some(tx) = account.opening_transaction {
            state.append_transaction(id, tx);
        }

        Ok(created)
    }

    async fn account(&self, account_id: AccountId) -> StoreResult<Option<GamblerAccount>> {
        Ok(self.state().accounts.get(&account_id).cloned())
    }

    async fn newest_account(&self, user_id: UserId) -> StoreResult<Option<GamblerAccount>> {
        Ok(self
            .state()
            .accounts
            .values()
            .rev()
            .find(|account| {
                account.user_id == user_id && account.state != AccountState::PermanentlyBanned
            })
            .cloned())
    }

    async fn has_permanent_ban(&self, user_id: UserId) -> StoreResult<bool> {
        Ok(self.state().is_banned(user_id))
    }

    async fn account_ids(&self) -> StoreResult<Vec<AccountId>> {
        Ok(self.state().accounts.keys().copied().collect())
    }

    async fn accounts_for_user(&self, user_id: UserId) -> StoreResult<Vec<GamblerAccount>> {
        Ok(self
            .state()
            .accounts
            .values()
            .filter(|account| account.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn set_state(
        &self,
        account_id: AccountId,
        expected_version: i64,
        new_state: AccountState,
    ) -> StoreResult<GamblerAccount> {
        let mut state = self.state();
        state.check_version(account_id, expected_version)?;

        let user_id = state.account_mut(account_id)?.user_id;
        if new_state == AccountState::Active {
            if state.is_banned(user_id) {
                return Err(StoreError::UserBanned { user_id });
            }
            if state.has_other_active(user_id, Some(account_id)) {
                return Err(StoreError::ActiveAccountExists { user_id });
            }
        }

        let account = state.account_mut(account_id)?;
        account.state = new_state;
        account.version += 1;
        Ok(account.clone())
    }

    async fn commit(&self, batch: CommitBatch) -> StoreResult<CommitReceipt> {
        let mut state = self.state();
        state.validate(&batch)?;

        let mut receipt = CommitReceipt::default();
        for write in batch.writes {
            state.apply(write, &mut receipt)?;
        }
        Ok(receipt)
    }

    async fn transactions(&self, account_id: AccountId) -> StoreResult<Vec<Transaction>> {
        Ok(self
            .state()
            .transactions
            .iter()
            .filter(|tx| tx.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn wager(&self, wager_id: Uuid) -> StoreResult<Option<Wager>> {
        let state = self.state();
        Ok(state
            .wager_index
            .get(&wager_id)
            .map(|&index| state.wagers[index].clone()))
    }

    async fn wagers(&self, account_id: AccountId) -> StoreResult<Vec<Wager>> {
        Ok(self
            .state()
            .wagers
            .iter()
            .filter(|wager| wager.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn latest_exclusion(&self, account_id: AccountId) -> StoreResult<Option<Exclusion>> {
        Ok(self
            .state()
            .exclusions
            .iter()
            .rev()
            .find(|exclusion| exclusion.account_id == account_id)
            .cloned())
    }

    async fn insert_exclusion(&self, exclusion: NewExclusion) -> StoreResult<Exclusion> {
        let mut state = self.state();
        if !state.accounts.contains_key(&exclusion.account_id) {
            return Err(StoreError::NotFound(format!(
                "account {}",
                exclusion.account_id
            )));
        }

        state.next_exclusion_id += 1;
        let created = Exclusion {
            id: state.next_exclusion_id,
            account_id: exclusion.account_id,
            created_at: exclusion.created_at,
            expires_at: exclusion.expires_at,
            source: exclusion.source,
        };
        state.exclusions.push(created.clone());
        Ok(created)
    }

    async fn vip_perks(&self, account_id: AccountId) -> StoreResult<Vec<VipPerk>> {
        Ok(self
            .state()
            .perks
            .iter()
            .filter(|perk| perk.account_id == account_id)
            .cloned()
            .collect())
    }
}
