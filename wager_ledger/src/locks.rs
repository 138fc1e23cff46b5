//! Per-account mutual exclusion.
//!
//! Every balance mutation runs while holding its account's lock, so commands
//! for one gambler are applied one at a time and in arrival order (tokio's
//! mutex is fair), while commands for different gamblers never wait on each
//! other.

use crate::account::AccountId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as TableMutex, MutexGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle entries are dropped once the table grows past this many accounts
const PRUNE_THRESHOLD: usize = 1024;

/// Held while an account is being mutated
pub type AccountGuard = OwnedMutexGuard<()>;

/// Table of per-account locks
#[derive(Clone, Default)]
pub struct AccountLocks {
    locks: Arc<TableMutex<HashMap<AccountId, Arc<Mutex<()>>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one account
    pub async fn lock(&self, account_id: AccountId) -> AccountGuard {
        let lock = self.entry(account_id);
        lock.lock_owned().await
    }

    /// Wait for exclusive access to two distinct accounts.
    ///
    /// Locks are always taken in ascending id order so two transfers in
    /// opposite directions cannot deadlock. Guards are returned in argument
    /// order.
    pub async fn lock_pair(
        &self,
        first: AccountId,
        second: AccountId,
    ) -> (AccountGuard, AccountGuard) {
        if first <= second {
            let a = self.lock(first).await;
            let b = self.lock(second).await;
            (a, b)
        } else {
            let b = self.lock(second).await;
            let a = self.lock(first).await;
            (a, b)
        }
    }

    /// Number of accounts with a lock entry
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<AccountId, Arc<Mutex<()>>>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The table is held only long enough to clone one entry
    fn entry(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        let mut locks = self.table();

        if locks.len() > PRUNE_THRESHOLD {
            // Only the table itself still references an idle lock
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
