//! Exclusion enforcement through the wager engine.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use wager_ledger::{
    LedgerConfig, Role, WagerEngine,
    db::MemoryLedgerStore,
    exclusion::{ExclusionError, ExclusionSource},
    wager::{Game, PlaceWager, WagerError},
};

async fn setup_with_account() -> (WagerEngine, i64) {
    let engine = WagerEngine::new(Arc::new(MemoryLedgerStore::new()), LedgerConfig::default());
    let account = engine
        .accounts()
        .resolve_or_create(1, true)
        .await
        .unwrap()
        .unwrap();
    (engine, account.id)
}

#[tokio::test]
async fn test_excluded_account_cannot_wager() {
    let (engine, account_id) = setup_with_account().await;

    let exclusion = engine
        .exclusions()
        .exclude(account_id, Duration::hours(1), ExclusionSource::Hostess)
        .await
        .unwrap();

    let result = engine
        .place_for_user(1, PlaceWager::complete(dec!(10), dec!(-10), Game::Dice))
        .await;
    match result {
        Err(WagerError::Excluded { until }) => assert_eq!(until, exclusion.expires_at),
        other => panic!("expected exclusion, got {other:?}"),
    }

    let account = engine.accounts().get(account_id).await.unwrap();
    assert_eq!(account.balance, dec!(1000));
}

#[tokio::test]
async fn test_exclusion_expires() {
    let (engine, account_id) = setup_with_account().await;

    let exclusion = engine
        .exclusions()
        .exclude(account_id, Duration::minutes(30), ExclusionSource::Administrative)
        .await
        .unwrap();

    let inside = Utc::now() + Duration::minutes(29);
    let after = exclusion.expires_at + Duration::seconds(1);
    assert!(
        engine
            .exclusions()
            .active_exclusion_at(account_id, inside)
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        engine
            .exclusions()
            .active_exclusion_at(account_id, after)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        engine
            .exclusions()
            .active_exclusion_at(account_id, exclusion.expires_at)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_latest_exclusion_wins() {
    let (engine, account_id) = setup_with_account().await;

    engine
        .exclusions()
        .exclude(account_id, Duration::days(7), ExclusionSource::Administrative)
        .await
        .unwrap();
    let short = engine
        .exclusions()
        .exclude(account_id, Duration::minutes(5), ExclusionSource::Hostess)
        .await
        .unwrap();

    let active = engine
        .exclusions()
        .active_exclusion(account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, short.id);

    let tomorrow = Utc::now() + Duration::days(1);
    assert!(
        engine
            .exclusions()
            .active_exclusion_at(account_id, tomorrow)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_gamblers_cannot_exclude() {
    let (engine, account_id) = setup_with_account().await;

    let result = engine
        .exclusions()
        .exclude_as(Role::Gambler, account_id, Duration::hours(1))
        .await;
    assert!(matches!(result, Err(ExclusionError::Unauthorized)));

    let hostess = engine
        .exclusions()
        .exclude_as(Role::Hostess, account_id, Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(hostess.source, ExclusionSource::Hostess);

    let owner = engine
        .exclusions()
        .exclude_as(Role::Owner, account_id, Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(owner.source, ExclusionSource::Administrative);
}

#[tokio::test]
async fn test_exclusion_needs_positive_duration() {
    let (engine, account_id) = setup_with_account().await;

    for duration in [Duration::zero(), Duration::seconds(-5)] {
        let result = engine
            .exclusions()
            .exclude(account_id, duration, ExclusionSource::Hostess)
            .await;
        assert!(matches!(result, Err(ExclusionError::InvalidDuration(_))));
    }

    let missing = engine
        .exclusions()
        .exclude(account_id + 1000, Duration::hours(1), ExclusionSource::Hostess)
        .await;
    assert!(matches!(missing, Err(ExclusionError::AccountNotFound(_))));
}
