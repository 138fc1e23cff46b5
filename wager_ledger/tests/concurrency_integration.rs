//! Concurrency tests for the ledger.
//!
//! Many tasks hammer the same accounts at once; afterwards every balance must
//! equal the sum of its transactions and no account may have been overdrawn.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::task::JoinHandle;
use wager_ledger::{
    EventSource, LedgerConfig, WagerEngine,
    db::MemoryLedgerStore,
    vip::VipSchedule,
    wager::{Game, PlaceWager, WagerError, WagerRequest},
};

async fn join_all<T>(handles: Vec<JoinHandle<T>>) -> Vec<T> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.expect("task panicked"));
    }
    results
}

/// Engine without VIP tiers so bonuses never move the balances under test
fn setup_engine() -> WagerEngine {
    let config = LedgerConfig {
        vip_schedule: VipSchedule::empty(),
        ..LedgerConfig::default()
    };
    WagerEngine::new(Arc::new(MemoryLedgerStore::new()), config)
}

async fn open_account(engine: &WagerEngine, user_id: i64) -> i64 {
    engine
        .accounts()
        .resolve_or_create(user_id, true)
        .await
        .unwrap()
        .unwrap()
        .id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_wagers_never_overdraw() {
    let engine = setup_engine();
    let account_id = open_account(&engine, 1).await;

    // 40 stakes of 50 against a balance of 1000: exactly 20 can be covered
    let handles = (0..40)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .place_wager(WagerRequest {
                        account_id,
                        wager: PlaceWager::complete(dec!(50), dec!(-50), Game::Dice),
                    })
                    .await
            })
        })
        .collect();
    let results = join_all(handles).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(WagerError::InsufficientBalance { .. })))
        .count();
    assert_eq!(accepted, 20);
    assert_eq!(refused, 20);

    let account = engine.accounts().get(account_id).await.unwrap();
    assert_eq!(account.balance, Decimal::ZERO);
    assert_eq!(account.total_wagered, dec!(1000));

    let audit = engine.ledger().audit(account_id).await.unwrap();
    assert!(audit.is_consistent(), "{audit:?}");
    assert_eq!(audit.transaction_count, 21);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_wins_and_losses_sum_up() {
    let engine = setup_engine();
    let account_id = open_account(&engine, 1).await;

    let handles = (0..100)
        .map(|i| {
            let engine = engine.clone();
            let effect = if i % 2 == 0 { dec!(3) } else { dec!(-2) };
            tokio::spawn(async move {
                engine
                    .place_wager(WagerRequest {
                        account_id,
                        wager: PlaceWager::complete(dec!(2), effect, Game::Coinflip),
                    })
                    .await
            })
        })
        .collect();

    for result in join_all(handles).await {
        result.unwrap();
    }

    let account = engine.accounts().get(account_id).await.unwrap();
    assert_eq!(account.balance, dec!(1050));
    assert_eq!(account.total_wagered, dec!(200));
    assert!(engine.ledger().audit(account_id).await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_first_contact_race_creates_one_account() {
    let engine = setup_engine();

    let handles = (0..16)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.accounts().resolve_or_create(9, true).await })
        })
        .collect();

    let ids: Vec<i64> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap().id)
        .collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(engine.accounts().accounts(9).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_conserve_funds() {
    let engine = setup_engine();
    let a = open_account(&engine, 1).await;
    let b = open_account(&engine, 2).await;

    let handles = (0..50)
        .map(|i| {
            let ledger = engine.ledger().clone();
            let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
            tokio::spawn(async move { ledger.transfer(from, to, dec!(7), None).await })
        })
        .collect();

    for result in join_all(handles).await {
        result.unwrap();
    }

    let balance_a = engine.accounts().get(a).await.unwrap().balance;
    let balance_b = engine.accounts().get(b).await.unwrap().balance;
    assert_eq!(balance_a + balance_b, dec!(2000));
    assert_eq!(balance_a, dec!(1000));
    assert!(engine.ledger().audit(a).await.unwrap().is_consistent());
    assert!(engine.ledger().audit(b).await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_adjustments_race_with_wagers() {
    let engine = setup_engine();
    let account_id = open_account(&engine, 1).await;

    let mut handles = Vec::new();
    for i in 0..30 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            if i % 3 == 0 {
                engine
                    .ledger()
                    .apply_effect(account_id, dec!(10), EventSource::Rakeback, None, None)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            } else {
                engine
                    .place_wager(WagerRequest {
                        account_id,
                        wager: PlaceWager::complete(dec!(5), dec!(-5), Game::Slots),
                    })
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
        }));
    }

    for result in join_all(handles).await {
        result.unwrap();
    }

    let account = engine.accounts().get(account_id).await.unwrap();
    assert_eq!(account.balance, dec!(1000));
    assert!(engine.ledger().audit(account_id).await.unwrap().is_consistent());
}
