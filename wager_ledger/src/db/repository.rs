//! Store trait and the write batches it commits.
//!
//! Every balance-affecting write reaches the store as a [`CommitBatch`]: the
//! new account figures, the rows appended alongside them and the version each
//! account was read at. Implementations apply a batch all-or-nothing and
//! reject it with [`StoreError::VersionConflict`] when any account moved on
//! since it was read.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::errors::{StoreError, StoreResult};
use crate::account::{AccountId, AccountState, GamblerAccount, UserId};
use crate::exclusion::{Exclusion, NewExclusion};
use crate::ledger::{NewTransaction, Transaction};
use crate::vip::{NewVipPerk, VipPerk};
use crate::wager::{NewWager, Wager};

/// Account to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub user_id: UserId,
    pub state: AccountState,
    pub random_seed: String,
    pub next_vip_wager_threshold: Option<Decimal>,
    /// Written as the account's first transaction when non-zero
    pub opening_transaction: Option<NewTransaction>,
    /// Active account abandoned in the same write, with the version it was read at
    pub replaces: Option<(AccountId, i64)>,
}

/// Change to the wagers table carried by a commit
#[derive(Debug, Clone, PartialEq)]
pub enum WagerWrite {
    Insert(NewWager),
    /// Transition a pending wager to complete
    Complete {
        wager_id: Uuid,
        wager_effect: Decimal,
        multiplier: Decimal,
    },
}

/// All changes to one account within a commit
#[derive(Debug, Clone, PartialEq)]
pub struct AccountWrite {
    pub account_id: AccountId,
    pub expected_version: i64,
    pub balance: Decimal,
    pub total_wagered: Decimal,
    pub next_vip_wager_threshold: Option<Decimal>,
    pub wager: Option<WagerWrite>,
    /// Appended in order; each `new_balance` follows from the previous one
    pub transactions: Vec<NewTransaction>,
    pub perks: Vec<NewVipPerk>,
}

/// Atomic unit of work spanning one or more accounts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommitBatch {
    pub writes: Vec<AccountWrite>,
}

impl CommitBatch {
    pub fn single(write: AccountWrite) -> Self {
        Self {
            writes: vec![write],
        }
    }
}

/// Rows produced by a successful commit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommitReceipt {
    pub accounts: Vec<GamblerAccount>,
    pub transactions: Vec<Transaction>,
    pub wagers: Vec<Wager>,
    pub perks: Vec<VipPerk>,
}

impl CommitReceipt {
    /// Updated state of `account_id`
    pub fn account(&self, account_id: AccountId) -> StoreResult<&GamblerAccount> {
        self.accounts
            .iter()
            .find(|account| account.id == account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {account_id} in commit receipt")))
    }
}

/// Trait for ledger persistence
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Check the store is reachable
    async fn health_check(&self) -> StoreResult<()>;

    /// Insert an account (and its opening transaction)
    ///
    /// Fails with `UserBanned` if an active account is inserted for a banned
    /// user, and with `ActiveAccountExists` if the user already has an active
    /// account other than the one being replaced. The ban check and the insert
    /// are one atomic step.
    async fn insert_account(&self, account: NewAccount) -> StoreResult<GamblerAccount>;

    /// Find account by ID
    async fn account(&self, account_id: AccountId) -> StoreResult<Option<GamblerAccount>>;

    /// Newest account of a user whose state is not `PermanentlyBanned`
    async fn newest_account(&self, user_id: UserId) -> StoreResult<Option<GamblerAccount>>;

    /// Whether any account of the user is permanently banned
    async fn has_permanent_ban(&self, user_id: UserId) -> StoreResult<bool>;

    /// Ids of every account, ascending
    async fn account_ids(&self) -> StoreResult<Vec<AccountId>>;

    /// Every account of a user, oldest first
    async fn accounts_for_user(&self, user_id: UserId) -> StoreResult<Vec<GamblerAccount>>;

    /// Version-checked lifecycle change; reactivation of a banned user's
    /// account fails with `UserBanned`
    async fn set_state(
        &self,
        account_id: AccountId,
        expected_version: i64,
        state: AccountState,
    ) -> StoreResult<GamblerAccount>;

    /// Apply a batch atomically
    async fn commit(&self, batch: CommitBatch) -> StoreResult<CommitReceipt>;

    /// Transactions of an account in the order they were applied
    async fn transactions(&self, account_id: AccountId) -> StoreResult<Vec<Transaction>>;

    /// Find wager by ID
    async fn wager(&self, wager_id: Uuid) -> StoreResult<Option<Wager>>;

    /// Wagers of an account, oldest first
    async fn wagers(&self, account_id: AccountId) -> StoreResult<Vec<Wager>>;

    /// Most recently created exclusion of an account
    async fn latest_exclusion(&self, account_id: AccountId) -> StoreResult<Option<Exclusion>>;

    /// Append an exclusion
    async fn insert_exclusion(&self, exclusion: NewExclusion) -> StoreResult<Exclusion>;

    /// VIP grants of an account, oldest first
    async fn vip_perks(&self, account_id: AccountId) -> StoreResult<Vec<VipPerk>>;
}
