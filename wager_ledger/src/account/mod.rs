//! Gambler accounts: lazy creation, resolution from a platform user and the lifecycle.
//!
//! A user has at most one active account at a time. Accounts are never
//! deleted; abandoning, liquidating and banning are state transitions, and a
//! permanent ban on any of a user's accounts blocks every future account.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{AccountError, AccountResult};
pub use manager::{GamblerAccountManager, OPENING_BALANCE_COMMENT};
pub use models::{AccountId, AccountState, GamblerAccount, Role, UserId};
