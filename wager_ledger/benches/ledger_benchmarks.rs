use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rust_decimal::Decimal;
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;
use wager_ledger::{
    DeterministicRng, EventSource, LedgerConfig, WagerEngine,
    db::MemoryLedgerStore,
    wager::{Game, PlaceWager, WagerRequest, derive_multiplier},
};

const SEED: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

/// Helper to create an engine with one funded account
fn setup_engine(runtime: &Runtime) -> (WagerEngine, i64) {
    let config = LedgerConfig {
        initial_balance: Decimal::from(1_000_000_000),
        ..LedgerConfig::default()
    };
    let engine = WagerEngine::new(Arc::new(MemoryLedgerStore::new()), config);
    let account_id = runtime.block_on(async {
        engine
            .accounts()
            .resolve_or_create(1, true)
            .await
            .unwrap()
            .unwrap()
            .id
    });
    (engine, account_id)
}

/// Benchmark seeded draws with increasing iteration counts
fn bench_deterministic_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("deterministic_draw");

    for iterations in [1u32, 10, 100, 1_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_iterations", iterations)),
            iterations,
            |b, &n| {
                b.iter(|| DeterministicRng::draw(black_box(SEED), &[], 1, 100, n));
            },
        );
    }

    group.finish();
}

/// Benchmark multiplier derivation
fn bench_multiplier(c: &mut Criterion) {
    let amount = Decimal::new(3_333, 2);
    let effect = Decimal::new(12_345, 2);

    c.bench_function("derive_multiplier", |b| {
        b.iter(|| derive_multiplier(black_box(amount), black_box(effect), true));
    });
}

/// Benchmark a complete wager: checks, commit and VIP lookup
fn bench_place_wager(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let (engine, account_id) = setup_engine(&runtime);

    c.bench_function("place_wager", |b| {
        b.to_async(&runtime).iter(|| async {
            engine
                .place_wager(WagerRequest {
                    account_id,
                    wager: PlaceWager::complete(Decimal::ONE, Decimal::NEGATIVE_ONE, Game::Dice),
                })
                .await
                .unwrap()
        });
    });
}

/// Benchmark a plain balance adjustment
fn bench_apply_effect(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let (engine, account_id) = setup_engine(&runtime);

    c.bench_function("apply_effect", |b| {
        b.to_async(&runtime).iter(|| async {
            engine
                .ledger()
                .apply_effect(account_id, Decimal::ONE, EventSource::Rakeback, None, None)
                .await
                .unwrap()
        });
    });
}

/// Benchmark auditing an account with a growing history
fn bench_audit(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("audit");

    for history in [10usize, 100, 1_000].iter() {
        let (engine, account_id) = setup_engine(&runtime);
        runtime.block_on(async {
            for _ in 0..*history {
                engine
                    .place_wager(WagerRequest {
                        account_id,
                        wager: PlaceWager::complete(Decimal::ONE, Decimal::ONE, Game::Coinflip),
                    })
                    .await
                    .unwrap();
            }
        });

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_wagers", history)),
            history,
            |b, _| {
                b.to_async(&runtime)
                    .iter(|| async { engine.ledger().audit(account_id).await.unwrap() });
            },
        );
    }

    group.finish();
}

criterion_group!(pure, bench_deterministic_draw, bench_multiplier);

criterion_group!(ledger_operations, bench_place_wager, bench_apply_effect, bench_audit);

criterion_main!(pure, ledger_operations);
