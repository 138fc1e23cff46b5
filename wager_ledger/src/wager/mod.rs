//! Wager placement and resolution.
//!
//! This module implements:
//! - Atomic wager placement: wager row, balance and transaction in one commit
//! - Pending wagers that hold the stake until resolved
//! - Exact decimal multipliers
//! - Post-commit VIP progression
//!
//! ## Example
//!
//! ```no_run
//! use rust_decimal::Decimal;
//! use wager_ledger::wager::{Game, PlaceWager, WagerEngine};
//!
//! # async fn example(engine: &WagerEngine) -> Result<(), wager_ledger::wager::WagerError> {
//! // Sportsbook bet settled later
//! let pending = engine
//!     .place_for_user(7, PlaceWager::pending(Decimal::from(50), Game::Sportsbook))
//!     .await?;
//!
//! let settled = engine
//!     .resolve_incomplete_wager(pending.wager.id, Decimal::from(20))
//!     .await?;
//! println!("Balance after settlement: {}", settled.balance_after);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod errors;
pub mod models;

pub use engine::WagerEngine;
pub use errors::{WagerError, WagerResult};
pub use models::{
    Game, NewWager, PlaceWager, PlacedWager, Wager, WagerRequest,
    derive_multiplier,
};
