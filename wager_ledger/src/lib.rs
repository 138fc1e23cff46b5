//! # Wager Ledger
//!
//! A concurrency-safe wagering ledger: it owns each gambler's balance, records
//! every wager and its monetary effect, derives VIP progression from wagered
//! volume, enforces time-boxed betting exclusions and produces a reproducible
//! outcome stream per gambler.
//!
//! ## Architecture
//!
//! Components, leaves first:
//!
//! - [`rng`]: per-account deterministic outcomes from a persisted seed
//! - [`exclusion`]: time-boxed betting bans
//! - [`ledger`]: the append-only transaction log; the only path that changes a balance
//! - [`vip`]: tiered bonuses granted from cumulative wagered volume
//! - [`account`]: user to active-account resolution and the account lifecycle
//! - [`wager`]: the orchestrator that places and resolves wagers
//!
//! Persistence goes through the [`db::LedgerStore`] trait, implemented for
//! PostgreSQL ([`db::PgLedgerStore`]) and in memory ([`db::MemoryLedgerStore`]).
//!
//! Every balance mutation for an account runs under that account's lock and is
//! written as one versioned commit, so two commands for the same gambler can
//! never interleave while different gamblers proceed in parallel.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use rust_decimal::Decimal;
//! use wager_ledger::{LedgerConfig, WagerEngine, db::MemoryLedgerStore, wager::{Game, PlaceWager}};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = WagerEngine::new(Arc::new(MemoryLedgerStore::new()), LedgerConfig::default());
//!
//! let placed = engine
//!     .place_for_user(42, PlaceWager::complete(Decimal::from(100), Decimal::from(-100), Game::Dice))
//!     .await?;
//! assert_eq!(placed.balance_after, Decimal::from(900));
//! # Ok(())
//! # }
//! ```

/// Gambler accounts and their lifecycle.
pub mod account;
/// Ledger-wide configuration.
pub mod config;
/// Persistence: the store trait and its PostgreSQL and in-memory implementations.
pub mod db;
/// Time-boxed betting exclusions.
pub mod exclusion;
/// Balance ledger and transaction history.
pub mod ledger;
/// Per-account serialization of balance mutations.
pub mod locks;
/// Deterministic per-account outcome generation.
pub mod rng;
/// VIP progression.
pub mod vip;
/// Wager placement and resolution.
pub mod wager;

pub use account::{AccountState, GamblerAccount, GamblerAccountManager, Role};
pub use config::{ConfigError, LedgerConfig};
pub use exclusion::ExclusionManager;
pub use ledger::{BalanceLedger, EventSource, Transaction};
pub use rng::DeterministicRng;
pub use vip::VipProgressionEngine;
pub use wager::{Game, Wager, WagerEngine};
