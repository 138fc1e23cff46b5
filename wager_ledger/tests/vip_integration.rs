//! VIP progression through real wagering.
//!
//! Bonuses are driven by cumulative wagered volume regardless of outcome,
//! granted once per tier and paid as `Bonus` transactions.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use wager_ledger::{
    EventSource, LedgerConfig, WagerEngine,
    db::MemoryLedgerStore,
    vip::{VipLevelConfig, VipSchedule},
    wager::{Game, PlaceWager},
};

fn setup_engine() -> WagerEngine {
    WagerEngine::new(Arc::new(MemoryLedgerStore::new()), LedgerConfig::default())
}

fn two_level_schedule() -> VipSchedule {
    VipSchedule::from_levels(&[
        VipLevelConfig {
            name: "Copper".to_string(),
            bonus_payout: dec!(4),
            tier_count: 1,
            first_threshold: dec!(100),
            threshold_step: dec!(100),
        },
        VipLevelConfig {
            name: "Tin".to_string(),
            bonus_payout: dec!(9),
            tier_count: 1,
            first_threshold: dec!(300),
            threshold_step: dec!(100),
        },
    ])
    .unwrap()
}

#[tokio::test]
async fn test_losing_volume_still_progresses() {
    let engine = setup_engine();

    let placed = engine
        .place_for_user(1, PlaceWager::complete(dec!(1000), dec!(-1000), Game::Limbo))
        .await
        .unwrap();

    assert_eq!(placed.balance_after, Decimal::ZERO);
    assert_eq!(placed.vip_perks.len(), 1);
    assert_eq!(placed.vip_perks[0].level, "Bronze");
    assert_eq!(placed.vip_perks[0].tier, 1);
    assert_eq!(placed.vip_perks[0].payout, dec!(10));

    let account = engine.accounts().get(placed.account.id).await.unwrap();
    assert_eq!(account.balance, dec!(10));
    assert_eq!(account.next_vip_wager_threshold, Some(dec!(2000)));

    let bonus = engine
        .ledger()
        .transactions(account.id)
        .await
        .unwrap()
        .pop()
        .unwrap();
    assert_eq!(bonus.event_source, EventSource::Bonus);
    assert_eq!(bonus.effect, dec!(10));
}

#[tokio::test]
async fn test_tier_is_granted_once() {
    let engine = setup_engine();

    let first = engine
        .place_for_user(1, PlaceWager::complete(dec!(600), Decimal::ZERO, Game::Wheel))
        .await
        .unwrap();
    assert!(first.vip_perks.is_empty());

    let second = engine
        .place_for_user(1, PlaceWager::complete(dec!(600), Decimal::ZERO, Game::Wheel))
        .await
        .unwrap();
    assert_eq!(second.vip_perks.len(), 1);

    // A direct check right after has nothing left to grant
    let again = engine.vip().check(second.account.id).await.unwrap();
    assert!(again.is_empty());

    let perks = engine.vip().perks(second.account.id).await.unwrap();
    assert_eq!(perks.len(), 1);
}

#[tokio::test]
async fn test_large_wager_crosses_levels() {
    let config = LedgerConfig {
        vip_schedule: two_level_schedule(),
        ..LedgerConfig::default()
    };
    let engine = WagerEngine::new(Arc::new(MemoryLedgerStore::new()), config);

    let placed = engine
        .place_for_user(1, PlaceWager::complete(dec!(350), Decimal::ZERO, Game::Keno))
        .await
        .unwrap();

    let levels: Vec<&str> = placed.vip_perks.iter().map(|p| p.level.as_str()).collect();
    assert_eq!(levels, ["Copper", "Tin"]);

    let account = engine.accounts().get(placed.account.id).await.unwrap();
    assert_eq!(account.balance, dec!(1013));
    assert_eq!(account.next_vip_wager_threshold, None);

    // The schedule is exhausted; more volume grants nothing
    let later = engine
        .place_for_user(1, PlaceWager::complete(dec!(500), Decimal::ZERO, Game::Keno))
        .await
        .unwrap();
    assert!(later.vip_perks.is_empty());
}

#[tokio::test]
async fn test_tier_for_reports_progress() {
    let engine = setup_engine();

    assert!(engine.vip().tier_for(dec!(999.99)).is_none());
    let tier = engine.vip().tier_for(dec!(5000)).unwrap();
    assert_eq!(tier.level, "Silver");
    assert_eq!(tier.tier, 1);
}
