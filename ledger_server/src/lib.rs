//! HTTP front end for the wagering ledger.
//!
//! Exposes wager placement, resolution, account views and operator commands
//! over an axum router backed by a [`wager_ledger::WagerEngine`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
