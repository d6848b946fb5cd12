//! Concurrent same-player races against a shared store.
//!
//! Duplicate network retries and multiple devices can deliver taps for one
//! player at the same instant. Every check below must let exactly the right
//! number through no matter how the tasks interleave.

use std::sync::Arc;

use tapguard_core::codec;
use tapguard_core::keys;
use tapguard_core::{
    CounterStore, EngineConfig, ManualClock, PlayerId, RejectReason, StoreError, TapVerdict,
    TimingState,
};
use tapguard_engine::{AntiCheatEngine, RateLimiter, TimingAnalyzer, TimingModel};
use tapguard_store::MemoryCounterStore;
use tapguard_tests::helpers::{START_MS, tap, tap_with_nonce};

const RACERS: usize = 16;

fn shared_engine() -> (Arc<ManualClock>, Arc<MemoryCounterStore>, Arc<AntiCheatEngine>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let store = Arc::new(MemoryCounterStore::new(clock.clone()));
    let engine = AntiCheatEngine::new(EngineConfig::default(), store.clone(), clock.clone());
    (clock, store, Arc::new(engine))
}

async fn race<F>(n: usize, f: F) -> Vec<TapVerdict>
where
    F: Fn(usize) -> TapVerdict + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let f = f.clone();
            tokio::task::spawn_blocking(move || f(i))
        })
        .collect();

    let mut out = Vec::with_capacity(n);
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}

/// Identical retries of one tap: one passes, the rest are nonce replays.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_tap_passes_once() {
    let (_clock, _store, engine) = shared_engine();
    let verdicts = race(RACERS, move |_| engine.validate_tap(&tap(1, 1), 0.0)).await;

    assert_eq!(verdicts.iter().filter(|v| v.is_valid).count(), 1);
    assert!(
        verdicts
            .iter()
            .filter(|v| !v.is_valid)
            .all(|v| v.reason == Some(RejectReason::NonceReplay))
    );
}

/// Same sequence number with distinct nonces: only one advances the counter.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_sequence_passes_once() {
    let (_clock, _store, engine) = shared_engine();
    let verdicts = race(RACERS, move |i| {
        engine.validate_tap(&tap_with_nonce(1, 5, &format!("device-{i}")), 0.0)
    })
    .await;

    assert_eq!(verdicts.iter().filter(|v| v.is_valid).count(), 1);
    assert_eq!(
        verdicts
            .iter()
            .filter(|v| v.reason == Some(RejectReason::SequenceReplay))
            .count(),
        RACERS - 1
    );
}

/// Racing increments never let more than the cap through in one second.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rate_cap_holds_under_race() {
    let clock = Arc::new(ManualClock::new(START_MS));
    let store = Arc::new(MemoryCounterStore::new(clock.clone()));
    let limiter = Arc::new(RateLimiter::new(store, clock, 10));

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::task::spawn_blocking(move || limiter.check(PlayerId(1)))
        })
        .collect();

    let mut passed = 0;
    let mut rejected = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if outcome.is_reject() {
            rejected += 1;
        } else {
            passed += 1;
        }
    }
    assert_eq!(passed, 10);
    assert_eq!(rejected, 40);
}

/// Concurrent arrivals either land in the timing history or report
/// contention; none is silently lost.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timing_history_counts_every_recorded_arrival() {
    let clock = Arc::new(ManualClock::new(START_MS));
    let store = Arc::new(MemoryCounterStore::new(clock.clone()));
    let analyzer = Arc::new(TimingAnalyzer::new(
        TimingModel::from_config(&EngineConfig::default()),
        store.clone(),
        clock,
    ));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let analyzer = analyzer.clone();
            tokio::task::spawn_blocking(move || analyzer.observe(PlayerId(1)))
        })
        .collect();

    let mut recorded = 0usize;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => recorded += 1,
            Err(StoreError::Contention { .. }) => {}
            Err(e) => panic!("unexpected store error: {e}"),
        }
    }
    assert!(recorded >= 1);

    let key = keys::timing_key(PlayerId(1));
    let bytes = store.get(&key).unwrap().expect("timing state stored");
    let state: TimingState = codec::decode(&key, &bytes).unwrap();
    assert_eq!(state.recent_intervals.len(), recorded - 1);
}

/// Players never interfere with each other's counters.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn players_are_isolated() {
    let (_clock, _store, engine) = shared_engine();
    let handles: Vec<_> = (0..8u64)
        .map(|player| {
            let engine = engine.clone();
            tokio::task::spawn_blocking(move || {
                (1..=10)
                    .map(|seq| engine.validate_tap(&tap(player, seq), 0.0))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        let verdicts = handle.await.unwrap();
        assert!(verdicts.iter().all(|v| v.is_valid), "{verdicts:?}");
    }
}
