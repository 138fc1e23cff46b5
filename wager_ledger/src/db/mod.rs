//! Database module providing PostgreSQL connection pooling and the ledger store.
//!
//! The rest of the crate talks to persistence only through [`LedgerStore`];
//! [`Database`] builds the pool and applies migrations for the PostgreSQL
//! implementation.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod errors;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use errors::{StoreError, StoreResult};
pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use repository::{
    AccountWrite, CommitBatch, CommitReceipt, LedgerStore, NewAccount, WagerWrite,
};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wager_ledger::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), wager_ledger::db::StoreError> {
    ///     let config = DatabaseConfig::from_env();
    ///     let db = Database::new(&config).await?;
    ///     db.migrate().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        timeouts::with_timeout(
            timeouts::LONG_OPERATION_TIMEOUT,
            sqlx::migrate!("./migrations").run(&self.pool),
        )
        .await
    }

    /// Ledger store over this pool
    pub fn store(&self) -> PgLedgerStore {
        PgLedgerStore::new(self.pool.clone())
    }
}
