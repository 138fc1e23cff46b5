//! Exclusion manager: time-boxed betting bans.

use super::{
    errors::{ExclusionError, ExclusionResult},
    models::{Exclusion, ExclusionSource, NewExclusion},
};
use crate::{
    account::{AccountId, Role},
    db::LedgerStore,
};
use chrono::{DateTime, Duration, Utc};
use log::info;
use std::sync::Arc;

/// Exclusion manager
#[derive(Clone)]
pub struct ExclusionManager {
    store: Arc<dyn LedgerStore>,
}

impl ExclusionManager {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Whether the account may not bet right now
    pub async fn is_excluded(&self, account_id: AccountId) -> ExclusionResult<bool> {
        Ok(self.active_exclusion(account_id).await?.is_some())
    }

    /// Exclusion in force right now, if any
    pub async fn active_exclusion(&self, account_id: AccountId) -> ExclusionResult<Option<Exclusion>> {
        self.active_exclusion_at(account_id, Utc::now()).await
    }

    /// Exclusion in force at `now`, if any.
    ///
    /// Only the most recently created exclusion counts, so a newer, shorter
    /// exclusion replaces an older, longer one.
    pub async fn active_exclusion_at(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> ExclusionResult<Option<Exclusion>> {
        Ok(self
            .store
            .latest_exclusion(account_id)
            .await?
            .filter(|exclusion| exclusion.is_active_at(now)))
    }

    /// Exclude an account from betting for `duration`, starting now
    ///
    /// # Errors
    ///
    /// * `ExclusionError::InvalidDuration` - Zero or negative duration
    /// * `ExclusionError::AccountNotFound` - No such account
    pub async fn exclude(
        &self,
        account_id: AccountId,
        duration: Duration,
        source: ExclusionSource,
    ) -> ExclusionResult<Exclusion> {
        if duration <= Duration::zero() {
            return Err(ExclusionError::InvalidDuration(duration));
        }

        if self.store.account(account_id).await?.is_none() {
            return Err(ExclusionError::AccountNotFound(account_id));
        }

        let created_at = Utc::now();
        let expires_at = created_at
            .checked_add_signed(duration)
            .ok_or(ExclusionError::InvalidDuration(duration))?;

        let exclusion = self
            .store
            .insert_exclusion(NewExclusion {
                account_id,
                created_at,
                expires_at,
                source,
            })
            .await?;

        info!("Account {account_id} excluded by {source} until {expires_at}");
        Ok(exclusion)
    }

    /// Exclude on behalf of an operator, recording the source their role implies
    ///
    /// # Errors
    ///
    /// * `ExclusionError::Unauthorized` - The role may not exclude
    pub async fn exclude_as(
        &self,
        role: Role,
        account_id: AccountId,
        duration: Duration,
    ) -> ExclusionResult<Exclusion> {
        let source = ExclusionSource::for_role(role).ok_or(ExclusionError::Unauthorized)?;
        self.exclude(account_id, duration, source).await
    }
}
