//! VIP progression engine: grants tier bonuses from cumulative wagered volume.

use super::{
    errors::VipResult,
    models::{NewVipPerk, VipPerk, VipSchedule, VipTier},
};
use crate::{
    account::AccountId,
    ledger::{BalanceLedger, EventSource},
};
use log::info;
use rust_decimal::Decimal;
use std::sync::Arc;

/// VIP progression engine
#[derive(Clone)]
pub struct VipProgressionEngine {
    ledger: BalanceLedger,
    schedule: Arc<VipSchedule>,
}

impl VipProgressionEngine {
    pub fn new(ledger: BalanceLedger, schedule: VipSchedule) -> Self {
        Self {
            ledger,
            schedule: Arc::new(schedule),
        }
    }

    pub fn schedule(&self) -> &VipSchedule {
        &self.schedule
    }

    /// Highest tier reached with `total_wagered`
    pub fn tier_for(&self, total_wagered: Decimal) -> Option<&VipTier> {
        self.schedule.tier_for(total_wagered)
    }

    /// Grant every tier the account's wagered volume has reached.
    ///
    /// Tiers are granted in threshold order, each with a `Bonus` transaction
    /// and a perk row, and the account's next threshold advances past them;
    /// all of it in one commit. Returns the new perks, empty when nothing
    /// was due.
    pub async fn check(&self, account_id: AccountId) -> VipResult<Vec<VipPerk>> {
        let schedule = Arc::clone(&self.schedule);

        let committed = self
            .ledger
            .commit_with(account_id, |posting| {
                let total_wagered = posting.total_wagered();
                let mut next = posting.next_vip_wager_threshold();
                let mut granted = 0usize;

                while let Some(threshold) = next {
                    if total_wagered < threshold {
                        break;
                    }

                    // Resolve against the schedule in force, which may have changed
                    let Some(index) = schedule.position_at_or_after(threshold) else {
                        next = None;
                        break;
                    };
                    let tier = &schedule.tiers()[index];
                    if total_wagered < tier.threshold {
                        next = Some(tier.threshold);
                        break;
                    }

                    let payout = tier.payout();
                    posting.post(
                        payout,
                        EventSource::Bonus,
                        Some(format!("VIP {} tier {} bonus", tier.level, tier.tier)),
                        None,
                    )?;
                    posting.record_perk(NewVipPerk {
                        level: tier.level.clone(),
                        tier: tier.tier,
                        wager_threshold: tier.threshold,
                        payout,
                    });

                    next = schedule.threshold_after(index);
                    granted += 1;
                }

                posting.set_next_vip_threshold(next);
                Ok::<_, super::VipError>(granted)
            })
            .await?;

        for perk in &committed.receipt.perks {
            info!(
                "Account {account_id} reached VIP {} tier {} (wagered {}), paid {}",
                perk.level, perk.tier, perk.wager_threshold, perk.payout
            );
        }

        Ok(committed.receipt.perks)
    }

    /// VIP grants of an account, oldest first
    pub async fn perks(&self, account_id: AccountId) -> VipResult<Vec<VipPerk>> {
        let perks = self
            .ledger
            .store()
            .vip_perks(account_id)
            .await
            .map_err(crate::ledger::LedgerError::from)?;
        Ok(perks)
    }
}
