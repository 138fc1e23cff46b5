//! Balance ledger: append-only transactions and the single path that changes a balance.
//!
//! This module implements:
//! - Checked decimal postings; overflow is an error, never a wrap
//! - Versioned commits under the per-account lock, retried on conflict
//! - Peer transfers that lock both accounts in ascending id order
//! - Audits of an account against its transaction and wager history
//!
//! ## Example
//!
//! ```no_run
//! use rust_decimal::Decimal;
//! use wager_ledger::ledger::{BalanceLedger, EventSource};
//!
//! # async fn example(ledger: &BalanceLedger) -> Result<(), wager_ledger::ledger::LedgerError> {
//! let tx = ledger
//!     .apply_effect(1, Decimal::from(50), EventSource::Rakeback, None, None)
//!     .await?;
//! println!("Balance after rakeback: {}", tx.new_balance);
//!
//! let audit = ledger.audit(1).await?;
//! assert!(audit.is_consistent());
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use manager::{BalanceLedger, Committed, Posting};
pub use models::{EventSource, LedgerAudit, NewTransaction, Transaction};
