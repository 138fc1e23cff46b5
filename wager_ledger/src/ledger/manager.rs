//! Balance ledger: the only path that changes a balance.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{EventSource, LedgerAudit, NewTransaction, Transaction},
};
use crate::{
    account::{AccountId, GamblerAccount},
    config::LedgerConfig,
    db::{AccountWrite, CommitBatch, CommitReceipt, LedgerStore, StoreError, WagerWrite},
    locks::AccountLocks,
    vip::NewVipPerk,
};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Pending changes to one account, built against the state it was read in.
///
/// Every balance movement goes through [`Posting::post`], which appends the
/// matching transaction, so a committed posting always keeps the balance equal
/// to the sum of its transaction effects.
#[derive(Debug)]
pub struct Posting {
    account: GamblerAccount,
    balance: Decimal,
    total_wagered: Decimal,
    next_vip_wager_threshold: Option<Decimal>,
    wager: Option<WagerWrite>,
    transactions: Vec<NewTransaction>,
    perks: Vec<NewVipPerk>,
    dirty: bool,
}

impl Posting {
    fn new(account: GamblerAccount) -> Self {
        Self {
            balance: account.balance,
            total_wagered: account.total_wagered,
            next_vip_wager_threshold: account.next_vip_wager_threshold,
            account,
            wager: None,
            transactions: Vec::new(),
            perks: Vec::new(),
            dirty: false,
        }
    }

    /// Account as it was read
    pub fn account(&self) -> &GamblerAccount {
        &self.account
    }

    /// Balance including everything posted so far
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn total_wagered(&self) -> Decimal {
        self.total_wagered
    }

    pub fn next_vip_wager_threshold(&self) -> Option<Decimal> {
        self.next_vip_wager_threshold
    }

    /// Fail unless the current balance covers `required`
    pub fn require_funds(&self, required: Decimal) -> LedgerResult<()> {
        if required > self.balance {
            return Err(LedgerError::InsufficientBalance {
                available: self.balance,
                required,
            });
        }
        Ok(())
    }

    /// Move the balance by `effect` and append the transaction recording it.
    ///
    /// Returns the new balance.
    pub fn post(
        &mut self,
        effect: Decimal,
        event_source: EventSource,
        comment: Option<String>,
        counterparty_account_id: Option<AccountId>,
    ) -> LedgerResult<Decimal> {
        let new_balance = self
            .balance
            .checked_add(effect)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        self.balance = new_balance;
        self.transactions.push(NewTransaction {
            event_source,
            effect,
            new_balance,
            comment,
            counterparty_account_id,
        });
        self.dirty = true;
        Ok(new_balance)
    }

    /// Add to the cumulative wagered volume
    pub fn add_wagered(&mut self, amount: Decimal) -> LedgerResult<()> {
        self.total_wagered = self
            .total_wagered
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        self.dirty = true;
        Ok(())
    }

    /// Insert or complete a wager in the same commit
    pub fn record_wager(&mut self, wager: WagerWrite) {
        self.wager = Some(wager);
        self.dirty = true;
    }

    /// Append a VIP grant; its payout is posted separately
    pub fn record_perk(&mut self, perk: NewVipPerk) {
        self.perks.push(perk);
        self.dirty = true;
    }

    pub fn set_next_vip_threshold(&mut self, threshold: Option<Decimal>) {
        if threshold != self.next_vip_wager_threshold {
            self.next_vip_wager_threshold = threshold;
            self.dirty = true;
        }
    }

    fn set_total_wagered(&mut self, total: Decimal) {
        if total != self.total_wagered {
            self.total_wagered = total;
            self.dirty = true;
        }
    }

    fn into_write(self) -> AccountWrite {
        AccountWrite {
            account_id: self.account.id,
            expected_version: self.account.version,
            balance: self.balance,
            total_wagered: self.total_wagered,
            next_vip_wager_threshold: self.next_vip_wager_threshold,
            wager: self.wager,
            transactions: self.transactions,
            perks: self.perks,
        }
    }
}

/// Outcome of a [`BalanceLedger::commit_with`] call
#[derive(Debug, Clone)]
pub struct Committed<T> {
    /// What the builder returned on the attempt that committed
    pub value: T,
    /// Account after the commit (or as read, if nothing was written)
    pub account: GamblerAccount,
    pub receipt: CommitReceipt,
}

fn ledger_error<E: From<LedgerError>, S: Into<LedgerError>>(error: S) -> E {
    E::from(error.into())
}

/// Balance ledger over a [`LedgerStore`]
#[derive(Clone)]
pub struct BalanceLedger {
    store: Arc<dyn LedgerStore>,
    locks: AccountLocks,
    max_commit_retries: u32,
    retry_backoff: Duration,
}

impl BalanceLedger {
    /// Create a new ledger
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence backend
    /// * `locks` - Lock table shared with every component that mutates accounts
    /// * `config` - Retry settings
    pub fn new(store: Arc<dyn LedgerStore>, locks: AccountLocks, config: &LedgerConfig) -> Self {
        Self {
            store,
            locks,
            max_commit_retries: config.max_commit_retries.max(1),
            retry_backoff: config.retry_backoff,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    /// Read an account, build a posting against it and commit it atomically.
    ///
    /// Runs under the account's lock. `build` is re-run on fresh state when
    /// the commit loses a version race (another process wrote the account),
    /// so it must not have side effects outside the posting. A posting with
    /// no changes is not committed.
    ///
    /// # Errors
    ///
    /// * Whatever `build` returns
    /// * `LedgerError::AccountNotFound` - No such account
    /// * `LedgerError::ConcurrencyConflict` - Every attempt lost a version race
    /// * `LedgerError::Store` - Persistence failure
    pub async fn commit_with<T, E, F>(
        &self,
        account_id: AccountId,
        build: F,
    ) -> Result<Committed<T>, E>
    where
        F: FnMut(&mut Posting) -> Result<T, E>,
        E: From<LedgerError>,
    {
        let _guard = self.locks.lock(account_id).await;
        self.commit_locked(account_id, build).await
    }

    /// The retry loop of [`commit_with`](Self::commit_with); the caller holds the lock
    async fn commit_locked<T, E, F>(
        &self,
        account_id: AccountId,
        mut build: F,
    ) -> Result<Committed<T>, E>
    where
        F: FnMut(&mut Posting) -> Result<T, E>,
        E: From<LedgerError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let account = self.load(account_id).await.map_err(ledger_error::<E, _>)?;
            let mut posting = Posting::new(account);
            let value = build(&mut posting)?;

            if !posting.dirty {
                return Ok(Committed {
                    value,
                    account: posting.account,
                    receipt: CommitReceipt::default(),
                });
            }

            match self.store.commit(CommitBatch::single(posting.into_write())).await {
                Ok(receipt) => {
                    let account = receipt.account(account_id).map_err(ledger_error::<E, _>)?.clone();
                    return Ok(Committed {
                        value,
                        account,
                        receipt,
                    });
                }
                Err(e) => self.retry_or_fail(e, attempt).await.map_err(ledger_error::<E, _>)?,
            }
        }
    }

    /// Back off before another attempt, or turn the failure into an error
    async fn retry_or_fail(&self, error: StoreError, attempt: u32) -> LedgerResult<()> {
        if !error.is_retryable() {
            return Err(LedgerError::Store(error));
        }
        if attempt >= self.max_commit_retries {
            warn!("Giving up after {attempt} conflicting commits: {error}");
            return Err(LedgerError::ConcurrencyConflict { attempts: attempt });
        }

        debug!("Commit attempt {attempt} conflicted ({error}), retrying");
        tokio::time::sleep(self.retry_backoff * attempt).await;
        Ok(())
    }

    async fn load(&self, account_id: AccountId) -> LedgerResult<GamblerAccount> {
        self.store
            .account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// Apply a signed balance change and record it.
    ///
    /// A debit may not take the balance below zero.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientBalance` - Debit larger than the balance
    /// * `LedgerError::ArithmeticOverflow` - Balance out of range
    pub async fn apply_effect(
        &self,
        account_id: AccountId,
        effect: Decimal,
        event_source: EventSource,
        comment: Option<String>,
        counterparty_account_id: Option<AccountId>,
    ) -> LedgerResult<Transaction> {
        let committed = self
            .commit_with(account_id, |posting| {
                if effect < Decimal::ZERO {
                    posting.require_funds(-effect)?;
                }
                posting.post(effect, event_source, comment.clone(), counterparty_account_id)
            })
            .await?;

        debug!(
            "Applied {effect} ({event_source}) to account {account_id}, balance now {}",
            committed.value
        );

        committed
            .receipt
            .transactions
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Corrupt("commit returned no transaction".to_string()).into())
    }

    /// Move `amount` between two accounts in one commit.
    ///
    /// Returns the debit and credit transactions.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount not positive
    /// * `LedgerError::SelfTransfer` - Same account on both sides
    /// * `LedgerError::InsufficientBalance` - Sender cannot cover the amount
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        comment: Option<String>,
    ) -> LedgerResult<(Transaction, Transaction)> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }

        let _guards = self.locks.lock_pair(from, to).await;

        let mut attempt = 0;
        let receipt = loop {
            attempt += 1;

            let mut sender = Posting::new(self.load(from).await?);
            let mut receiver = Posting::new(self.load(to).await?);

            sender.require_funds(amount)?;
            sender.post(-amount, EventSource::Other, comment.clone(), Some(to))?;
            receiver.post(amount, EventSource::Other, comment.clone(), Some(from))?;

            let batch = CommitBatch {
                writes: vec![sender.into_write(), receiver.into_write()],
            };
            match self.store.commit(batch).await {
                Ok(receipt) => break receipt,
                Err(e) => self.retry_or_fail(e, attempt).await?,
            }
        };

        let debit = receipt.transactions.iter().find(|tx| tx.account_id == from);
        let credit = receipt.transactions.iter().find(|tx| tx.account_id == to);
        match (debit, credit) {
            (Some(debit), Some(credit)) => {
                debug!("Transferred {amount} from account {from} to account {to}");
                Ok((debit.clone(), credit.clone()))
            }
            _ => Err(StoreError::Corrupt("transfer commit missing a transaction".to_string()).into()),
        }
    }

    /// Transaction history, oldest first
    pub async fn transactions(&self, account_id: AccountId) -> LedgerResult<Vec<Transaction>> {
        self.load(account_id).await?;
        Ok(self.store.transactions(account_id).await?)
    }

    /// Check an account against its own transaction and wager history
    pub async fn audit(&self, account_id: AccountId) -> LedgerResult<LedgerAudit> {
        let _guard = self.locks.lock(account_id).await;

        let account = self.load(account_id).await?;
        let transactions = self.store.transactions(account_id).await?;
        let wagers = self.store.wagers(account_id).await?;

        let mut previous = Decimal::ZERO;
        let mut broken_chain_at = Vec::new();
        for tx in &transactions {
            if previous.checked_add(tx.effect) != Some(tx.new_balance) {
                broken_chain_at.push(tx.id);
            }
            // Follow the recorded chain so one gap is reported once
            previous = tx.new_balance;
        }

        let ledger_sum = transactions
            .iter()
            .try_fold(Decimal::ZERO, |sum, tx| sum.checked_add(tx.effect))
            .ok_or(LedgerError::ArithmeticOverflow)?;
        let recomputed_total_wagered = wagers
            .iter()
            .try_fold(Decimal::ZERO, |sum, wager| sum.checked_add(wager.wager_amount))
            .ok_or(LedgerError::ArithmeticOverflow)?;

        let audit = LedgerAudit {
            account_id,
            balance: account.balance,
            ledger_sum,
            transaction_count: transactions.len(),
            total_wagered: account.total_wagered,
            recomputed_total_wagered,
            broken_chain_at,
        };

        if !audit.is_consistent() {
            warn!("Account {account_id} failed audit: {audit:?}");
        }
        Ok(audit)
    }

    /// Rewrite `total_wagered` from wager history when the two disagree.
    ///
    /// The account is read before its wagers, so a wager committed by another
    /// process in between bumps the version and the attempt is retried with
    /// fresh history.
    ///
    /// Returns the corrected total, or `None` if it was already right.
    pub async fn reconcile_total_wagered(
        &self,
        account_id: AccountId,
    ) -> LedgerResult<Option<Decimal>> {
        let _guard = self.locks.lock(account_id).await;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let account = self.load(account_id).await?;
            let recomputed = self
                .store
                .wagers(account_id)
                .await?
                .iter()
                .try_fold(Decimal::ZERO, |sum, wager| sum.checked_add(wager.wager_amount))
                .ok_or(LedgerError::ArithmeticOverflow)?;

            let previous = account.total_wagered;
            if previous == recomputed {
                return Ok(None);
            }

            let mut posting = Posting::new(account);
            posting.set_total_wagered(recomputed);

            match self.store.commit(CommitBatch::single(posting.into_write())).await {
                Ok(_) => {
                    warn!(
                        "Reconciled total_wagered of account {account_id}: {previous} -> {recomputed}"
                    );
                    return Ok(Some(recomputed));
                }
                Err(e) => self.retry_or_fail(e, attempt).await?,
            }
        }
    }

    /// Reconcile every account; run once at startup.
    ///
    /// Returns the ids of the accounts whose total was corrected.
    pub async fn reconcile_all(&self) -> LedgerResult<Vec<AccountId>> {
        let account_ids = self.store.account_ids().await?;
        let checked = account_ids.len();

        let mut repaired = Vec::new();
        for account_id in account_ids {
            if self.reconcile_total_wagered(account_id).await?.is_some() {
                repaired.push(account_id);
            }
        }

        info!(
            "Startup reconciliation checked {} accounts, repaired {}",
            checked,
            repaired.len()
        );
        Ok(repaired)
    }
}
