//! Time-boxed betting exclusions.
//!
//! Exclusions are append-only. An account is excluded while the most recently
//! created exclusion has not yet expired.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{ExclusionError, ExclusionResult};
pub use manager::ExclusionManager;
pub use models::{Exclusion, ExclusionSource, NewExclusion};
