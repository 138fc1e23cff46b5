//! VIP data models and the tier schedule.

use super::errors::{VipError, VipResult};
use crate::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// VIP grant record (append-only, one row per tier crossing)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipPerk {
    pub id: i64,
    pub account_id: AccountId,
    pub level: String,
    /// 1-based position within the level
    pub tier: u32,
    pub wager_threshold: Decimal,
    pub payout: Decimal,
    pub created_at: DateTime<Utc>,
}

/// VIP perk not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewVipPerk {
    pub level: String,
    pub tier: u32,
    pub wager_threshold: Decimal,
    pub payout: Decimal,
}

/// One VIP level as configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipLevelConfig {
    pub name: String,
    pub bonus_payout: Decimal,
    pub tier_count: u32,
    /// Wagered volume unlocking tier 1
    pub first_threshold: Decimal,
    /// Additional volume between consecutive tiers
    pub threshold_step: Decimal,
}

/// A single tier, flattened out of its level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipTier {
    pub level: String,
    pub tier: u32,
    pub tier_count: u32,
    pub threshold: Decimal,
    pub bonus_payout: Decimal,
}

impl VipTier {
    /// Full bonus for the first tier of a level, an even share of it for every
    /// later tier. The share is the exact decimal quotient, not cents.
    pub fn payout(&self) -> Decimal {
        if self.tier <= 1 || self.tier_count <= 1 {
            return self.bonus_payout;
        }

        (self.bonus_payout / Decimal::from(self.tier_count - 1)).normalize()
    }
}

/// Ordered VIP tiers with strictly increasing thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipSchedule {
    tiers: Vec<VipTier>,
}

impl VipSchedule {
    /// Build a schedule from levels listed lowest first
    ///
    /// # Errors
    ///
    /// * `VipError::InvalidSchedule` - Empty level, negative bonus or thresholds not increasing
    pub fn from_levels(levels: &[VipLevelConfig]) -> VipResult<Self> {
        let mut tiers: Vec<VipTier> = Vec::new();

        for level in levels {
            if level.tier_count == 0 {
                return Err(VipError::InvalidSchedule(format!(
                    "level {} has no tiers",
                    level.name
                )));
            }
            if level.bonus_payout < Decimal::ZERO || level.threshold_step <= Decimal::ZERO {
                return Err(VipError::InvalidSchedule(format!(
                    "level {} needs a non-negative bonus and a positive step",
                    level.name
                )));
            }

            for index in 0..level.tier_count {
                let threshold = level
                    .threshold_step
                    .checked_mul(Decimal::from(index))
                    .and_then(|offset| level.first_threshold.checked_add(offset))
                    .ok_or_else(|| {
                        VipError::InvalidSchedule(format!("level {} overflows", level.name))
                    })?;

                if let Some(previous) = tiers.last() {
                    if threshold <= previous.threshold {
                        return Err(VipError::InvalidSchedule(format!(
                            "threshold {threshold} of level {} does not exceed {}",
                            level.name, previous.threshold
                        )));
                    }
                }

                tiers.push(VipTier {
                    level: level.name.clone(),
                    tier: index + 1,
                    tier_count: level.tier_count,
                    threshold,
                    bonus_payout: level.bonus_payout,
                });
            }
        }

        Ok(Self { tiers })
    }

    /// Schedule with no tiers; accounts never progress
    pub fn empty() -> Self {
        Self { tiers: Vec::new() }
    }

    pub fn tiers(&self) -> &[VipTier] {
        &self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Threshold every new account starts at
    pub fn first_threshold(&self) -> Option<Decimal> {
        self.tiers.first().map(|tier| tier.threshold)
    }

    /// Index of the first tier at or above `threshold`
    pub fn position_at_or_after(&self, threshold: Decimal) -> Option<usize> {
        self.tiers.iter().position(|tier| tier.threshold >= threshold)
    }

    /// Threshold of the tier following `index`
    pub fn threshold_after(&self, index: usize) -> Option<Decimal> {
        self.tiers.get(index + 1).map(|tier| tier.threshold)
    }

    /// Highest tier reached with `total_wagered`
    pub fn tier_for(&self, total_wagered: Decimal) -> Option<&VipTier> {
        self.tiers
            .iter()
            .take_while(|tier| tier.threshold <= total_wagered)
            .last()
    }
}

impl Default for VipSchedule {
    fn default() -> Self {
        let level = |name: &str, bonus: i64, tiers: u32, first: i64, step: i64| VipLevelConfig {
            name: name.to_string(),
            bonus_payout: Decimal::from(bonus),
            tier_count: tiers,
            first_threshold: Decimal::from(first),
            threshold_step: Decimal::from(step),
        };

        let levels = [
            level("Bronze", 10, 3, 1_000, 1_000),
            level("Silver", 50, 5, 5_000, 2_500),
            level("Gold", 200, 5, 25_000, 10_000),
            level("Platinum", 1_000, 5, 100_000, 50_000),
            level("Diamond", 5_000, 6, 500_000, 250_000),
        ];

        // The built-in levels are increasing and non-empty
        Self::from_levels(&levels).unwrap_or_else(|_| Self::empty())
    }
}
