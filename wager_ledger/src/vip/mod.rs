//! VIP progression: tiered bonuses unlocked by cumulative wagered volume.
//!
//! Levels (Bronze, Silver, Gold, Platinum, Diamond by default) are flattened
//! into one ordered list of tiers. Each account stores the threshold of the
//! next tier it has not been paid for; crossing it grants the tier's bonus
//! through the balance ledger.

pub mod engine;
pub mod errors;
pub mod models;

pub use engine::VipProgressionEngine;
pub use errors::{VipError, VipResult};
pub use models::{NewVipPerk, VipLevelConfig, VipPerk, VipSchedule, VipTier};
