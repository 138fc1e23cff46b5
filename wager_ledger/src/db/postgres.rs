//! PostgreSQL implementation of [`LedgerStore`].
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use std::str::FromStr;
use uuid::Uuid;

use super::errors::{StoreError, StoreResult};
use super::repository::{CommitBatch, CommitReceipt, LedgerStore, NewAccount, WagerWrite};
use super::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_default_timeout, with_timeout};
use crate::account::{AccountId, AccountState, GamblerAccount, UserId};
use crate::exclusion::{Exclusion, NewExclusion};
use crate::ledger::{NewTransaction, Transaction};
use crate::vip::VipPerk;
use crate::wager::Wager;

const ACCOUNT_COLUMNS: &str = "id, user_id, balance, state, random_seed, total_wagered, \
     next_vip_wager_threshold, version, created_at";

const TRANSACTION_COLUMNS: &str =
    "id, account_id, event_source, effect, new_balance, comment, counterparty_account_id, created_at";

const WAGER_COLUMNS: &str = "id, account_id, wager_amount, wager_effect, game, multiplier, \
     game_meta, is_complete, created_at";

const EXCLUSION_COLUMNS: &str = "id, account_id, created_at, expires_at, source";

const PERK_COLUMNS: &str = "id, account_id, level, tier, wager_threshold, payout, created_at";

fn parse_text<T: FromStr<Err = String>>(row: &PgRow, column: &str) -> StoreResult<T> {
    let text: String = row.try_get(column)?;
    text.parse().map_err(StoreError::Corrupt)
}

fn account_from_row(row: &PgRow) -> StoreResult<GamblerAccount> {
    Ok(GamblerAccount {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        balance: row.try_get("balance")?,
        state: parse_text(row, "state")?,
        random_seed: row.try_get("random_seed")?,
        total_wagered: row.try_get("total_wagered")?,
        next_vip_wager_threshold: row.try_get("next_vip_wager_threshold")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> StoreResult<Transaction> {
    Ok(Transaction {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        event_source: parse_text(row, "event_source")?,
        effect: row.try_get("effect")?,
        new_balance: row.try_get("new_balance")?,
        comment: row.try_get("comment")?,
        counterparty_account_id: row.try_get("counterparty_account_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn wager_from_row(row: &PgRow) -> StoreResult<Wager> {
    Ok(Wager {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        wager_amount: row.try_get("wager_amount")?,
        wager_effect: row.try_get("wager_effect")?,
        game: parse_text(row, "game")?,
        multiplier: row.try_get("multiplier")?,
        game_meta: row.try_get("game_meta")?,
        is_complete: row.try_get("is_complete")?,
        created_at: row.try_get("created_at")?,
    })
}

fn exclusion_from_row(row: &PgRow) -> StoreResult<Exclusion> {
    Ok(Exclusion {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        source: parse_text(row, "source")?,
    })
}

fn perk_from_row(row: &PgRow) -> StoreResult<VipPerk> {
    let tier: i32 = row.try_get("tier")?;
    Ok(VipPerk {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        level: row.try_get("level")?,
        tier: u32::try_from(tier).map_err(|_| StoreError::Corrupt(format!("tier {tier}")))?,
        wager_threshold: row.try_get("wager_threshold")?,
        payout: row.try_get("payout")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Lock an account row and compare its version, returning the owning user
async fn lock_version(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    account_id: AccountId,
    expected_version: i64,
) -> StoreResult<UserId> {
    let row = sqlx::query("SELECT version, user_id FROM gambler_accounts WHERE id = $1 FOR UPDATE")
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("account {account_id}")))?;

    let version: i64 = row.try_get("version")?;
    if version != expected_version {
        return Err(StoreError::VersionConflict { account_id });
    }
    Ok(row.try_get("user_id")?)
}

/// Serialize account creation and lifecycle changes of one user until commit
async fn lock_user(tx: &mut sqlx::Transaction<'_, Postgres>, user_id: UserId) -> StoreResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn user_is_banned(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    user_id: UserId,
) -> StoreResult<bool> {
    let row = sqlx::query(
        "SELECT EXISTS (SELECT 1 FROM gambler_accounts WHERE user_id = $1 AND state = $2) AS banned",
    )
    .bind(user_id)
    .bind(AccountState::PermanentlyBanned.as_str())
    .fetch_one(&mut **tx)
    .await?;
    Ok(row.try_get("banned")?)
}

async fn user_has_active(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    user_id: UserId,
    except: Option<AccountId>,
) -> StoreResult<bool> {
    let row = sqlx::query(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM gambler_accounts
            WHERE user_id = $1 AND state = $2 AND id IS DISTINCT FROM $3
        ) AS active
        "#,
    )
    .bind(user_id)
    .bind(AccountState::Active.as_str())
    .bind(except)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row.try_get("active")?)
}

async fn insert_transaction(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    account_id: AccountId,
    entry: &NewTransaction,
) -> StoreResult<Transaction> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO ledger_transactions
            (account_id, event_source, effect, new_balance, comment, counterparty_account_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {TRANSACTION_COLUMNS}
        "#
    ))
    .bind(account_id)
    .bind(entry.event_source.as_str())
    .bind(entry.effect)
    .bind(entry.new_balance)
    .bind(&entry.comment)
    .bind(entry.counterparty_account_id)
    .fetch_one(&mut **tx)
    .await?;

    transaction_from_row(&row)
}

/// Map a unique violation on the one-active-account index
fn active_conflict(error: sqlx::Error, user_id: UserId) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.constraint() == Some("gambler_accounts_one_active") => {
            StoreError::ActiveAccountExists { user_id }
        }
        _ => StoreError::Database(error),
    }
}

/// PostgreSQL-backed ledger store
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn health_check(&self) -> StoreResult<()> {
        with_default_timeout(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }

    async fn insert_account(&self, account: NewAccount) -> StoreResult<GamblerAccount> {
        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.pool.begin().await?;
            lock_user(&mut tx, account.user_id).await?;

            let replaced = account.replaces.map(|(id, _)| id);
            if account.state == AccountState::Active
                && user_is_banned(&mut tx, account.user_id).await?
            {
                return Err(StoreError::UserBanned {
                    user_id: account.user_id,
                });
            }
            if account.state == AccountState::PermanentlyBanned
                && user_has_active(&mut tx, account.user_id, replaced).await?
            {
                return Err(StoreError::ActiveAccountExists {
                    user_id: account.user_id,
                });
            }

            if let Some((replaced_id, expected_version)) = account.replaces {
                lock_version(&mut tx, replaced_id, expected_version).await?;
                sqlx::query(
                    "UPDATE gambler_accounts SET state = $2, version = version + 1 WHERE id = $1",
                )
                .bind(replaced_id)
                .bind(AccountState::Abandoned.as_str())
                .execute(&mut *tx)
                .await?;
            }

            let balance = account
                .opening_transaction
                .as_ref()
                .map_or(rust_decimal::Decimal::ZERO, |entry| entry.new_balance);

            let row = sqlx::query(&format!(
                r#"
                INSERT INTO gambler_accounts
                    (user_id, balance, state, random_seed, total_wagered, next_vip_wager_threshold)
                VALUES ($1, $2, $3, $4, 0, $5)
                RETURNING {ACCOUNT_COLUMNS}
                "#
            ))
            .bind(account.user_id)
            .bind(balance)
            .bind(account.state.as_str())
            .bind(&account.random_seed)
            .bind(account.next_vip_wager_threshold)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| active_conflict(e, account.user_id))?;

            let created = account_from_row(&row)?;

            if let Some(entry) = &account.opening_transaction {
                insert_transaction(&mut tx, created.id, entry).await?;
            }

            tx.commit().await?;
            Ok::<_, StoreError>(created)
        })
        .await
    }

    async fn account(&self, account_id: AccountId) -> StoreResult<Option<GamblerAccount>> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM gambler_accounts WHERE id = $1"
            ))
            .bind(account_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn newest_account(&self, user_id: UserId) -> StoreResult<Option<GamblerAccount>> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                r#"
                SELECT {ACCOUNT_COLUMNS} FROM gambler_accounts
                WHERE user_id = $1 AND state <> $2
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                "#
            ))
            .bind(user_id)
            .bind(AccountState::PermanentlyBanned.as_str())
            .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn has_permanent_ban(&self, user_id: UserId) -> StoreResult<bool> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT EXISTS (SELECT 1 FROM gambler_accounts WHERE user_id = $1 AND state = $2) AS banned",
            )
            .bind(user_id)
            .bind(AccountState::PermanentlyBanned.as_str())
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(row.try_get("banned")?)
    }

    async fn account_ids(&self) -> StoreResult<Vec<AccountId>> {
        let rows = with_default_timeout(
            sqlx::query("SELECT id FROM gambler_accounts ORDER BY id").fetch_all(&self.pool),
        )
        .await?;

        rows.iter()
            .map(|row| row.try_get("id").map_err(StoreError::from))
            .collect()
    }

    async fn accounts_for_user(&self, user_id: UserId) -> StoreResult<Vec<GamblerAccount>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM gambler_accounts WHERE user_id = $1 ORDER BY id"
            ))
            .bind(user_id)
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(account_from_row).collect()
    }

    async fn set_state(
        &self,
        account_id: AccountId,
        expected_version: i64,
        state: AccountState,
    ) -> StoreResult<GamblerAccount> {
        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.pool.begin().await?;

            // User lock before row lock, the same order insert_account uses
            let owner = sqlx::query("SELECT user_id FROM gambler_accounts WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("account {account_id}")))?;
            lock_user(&mut tx, owner.try_get("user_id")?).await?;

            let user_id = lock_version(&mut tx, account_id, expected_version).await?;
            if state == AccountState::Active && user_is_banned(&mut tx, user_id).await? {
                return Err(StoreError::UserBanned { user_id });
            }

            let row = sqlx::query(&format!(
                r#"
                UPDATE gambler_accounts SET state = $2, version = version + 1
                WHERE id = $1
                RETURNING {ACCOUNT_COLUMNS}
                "#
            ))
            .bind(account_id)
            .bind(state.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| active_conflict(e, user_id))?;

            let account = account_from_row(&row)?;
            tx.commit().await?;
            Ok::<_, StoreError>(account)
        })
        .await
    }

    async fn commit(&self, batch: CommitBatch) -> StoreResult<CommitReceipt> {
        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.pool.begin().await?;
            let mut receipt = CommitReceipt::default();

            // Row locks are taken in ascending id order across the batch
            let mut writes = batch.writes;
            writes.sort_by_key(|write| write.account_id);

            for write in &writes {
                lock_version(&mut tx, write.account_id, write.expected_version).await?;
            }

            for write in writes {
                let account_id = write.account_id;

                let row = sqlx::query(&format!(
                    r#"
                    UPDATE gambler_accounts
                    SET balance = $2, total_wagered = $3, next_vip_wager_threshold = $4,
                        version = version + 1
                    WHERE id = $1
                    RETURNING {ACCOUNT_COLUMNS}
                    "#
                ))
                .bind(account_id)
                .bind(write.balance)
                .bind(write.total_wagered)
                .bind(write.next_vip_wager_threshold)
                .fetch_one(&mut *tx)
                .await?;
                receipt.accounts.push(account_from_row(&row)?);

                match write.wager {
                    Some(WagerWrite::Insert(wager)) => {
                        let row = sqlx::query(&format!(
                            r#"
                            INSERT INTO wagers
                                (id, account_id, wager_amount, wager_effect, game, multiplier,
                                 game_meta, is_complete)
                            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                            RETURNING {WAGER_COLUMNS}
                            "#
                        ))
                        .bind(wager.id)
                        .bind(account_id)
                        .bind(wager.wager_amount)
                        .bind(wager.wager_effect)
                        .bind(wager.game.as_str())
                        .bind(wager.multiplier)
                        .bind(wager.game_meta)
                        .bind(wager.is_complete)
                        .fetch_one(&mut *tx)
                        .await?;
                        receipt.wagers.push(wager_from_row(&row)?);
                    }
                    Some(WagerWrite::Complete {
                        wager_id,
                        wager_effect,
                        multiplier,
                    }) => {
                        // Only a pending wager may be completed
                        let row = sqlx::query(&format!(
                            r#"
                            UPDATE wagers
                            SET wager_effect = $3, multiplier = $4, is_complete = TRUE
                            WHERE id = $1 AND account_id = $2 AND is_complete = FALSE
                            RETURNING {WAGER_COLUMNS}
                            "#
                        ))
                        .bind(wager_id)
                        .bind(account_id)
                        .bind(wager_effect)
                        .bind(multiplier)
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or(StoreError::StaleWager(wager_id))?;
                        receipt.wagers.push(wager_from_row(&row)?);
                    }
                    None => {}
                }

                for entry in &write.transactions {
                    receipt
                        .transactions
                        .push(insert_transaction(&mut tx, account_id, entry).await?);
                }

                for perk in write.perks {
                    let tier = i32::try_from(perk.tier)
                        .map_err(|_| StoreError::Corrupt(format!("tier {}", perk.tier)))?;
                    let row = sqlx::query(&format!(
                        r#"
                        INSERT INTO vip_perks (account_id, level, tier, wager_threshold, payout)
                        VALUES ($1, $2, $3, $4, $5)
                        RETURNING {PERK_COLUMNS}
                        "#
                    ))
                    .bind(account_id)
                    .bind(&perk.level)
                    .bind(tier)
                    .bind(perk.wager_threshold)
                    .bind(perk.payout)
                    .fetch_one(&mut *tx)
                    .await?;
                    receipt.perks.push(perk_from_row(&row)?);
                }
            }

            tx.commit().await?;
            Ok::<_, StoreError>(receipt)
        })
        .await
    }

    async fn transactions(&self, account_id: AccountId) -> StoreResult<Vec<Transaction>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM ledger_transactions WHERE account_id = $1 ORDER BY id"
            ))
            .bind(account_id)
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn wager(&self, wager_id: Uuid) -> StoreResult<Option<Wager>> {
        let row = with_default_timeout(
            sqlx::query(&format!("SELECT {WAGER_COLUMNS} FROM wagers WHERE id = $1"))
                .bind(wager_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(wager_from_row).transpose()
    }

    async fn wagers(&self, account_id: AccountId) -> StoreResult<Vec<Wager>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {WAGER_COLUMNS} FROM wagers WHERE account_id = $1 ORDER BY created_at, id"
            ))
            .bind(account_id)
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(wager_from_row).collect()
    }

    async fn latest_exclusion(&self, account_id: AccountId) -> StoreResult<Option<Exclusion>> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                r#"
                SELECT {EXCLUSION_COLUMNS} FROM exclusions
                WHERE account_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                "#
            ))
            .bind(account_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(exclusion_from_row).transpose()
    }

    async fn insert_exclusion(&self, exclusion: NewExclusion) -> StoreResult<Exclusion> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                r#"
                INSERT INTO exclusions (account_id, created_at, expires_at, source)
                VALUES ($1, $2, $3, $4)
                RETURNING {EXCLUSION_COLUMNS}
                "#
            ))
            .bind(exclusion.account_id)
            .bind(exclusion.created_at)
            .bind(exclusion.expires_at)
            .bind(exclusion.source.as_str())
            .fetch_one(&self.pool),
        )
        .await?;

        exclusion_from_row(&row)
    }

    async fn vip_perks(&self, account_id: AccountId) -> StoreResult<Vec<VipPerk>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {PERK_COLUMNS} FROM vip_perks WHERE account_id = $1 ORDER BY id"
            ))
            .bind(account_id)
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(perk_from_row).collect()
    }
}
