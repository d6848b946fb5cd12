//! Criterion benchmarks for the tap validation hot path.
//!
//! Covers: full pipeline on the in-memory store, the pure timing model, and
//! sanction tier lookup.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tapguard_core::constants::MAX_RECENT_INTERVALS;
use tapguard_core::{EngineConfig, ManualClock, PlayerId, TapEvent, TimingState};
use tapguard_engine::sanction::decision_for;
use tapguard_engine::timing::TimingModel;
use tapguard_engine::AntiCheatEngine;
use tapguard_store::MemoryCounterStore;

fn bench_validate_tap(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let store = Arc::new(MemoryCounterStore::new(clock.clone()));
    let engine = AntiCheatEngine::new(EngineConfig::default(), store, clock.clone());

    // Spread taps over many players so the rate cap does not dominate.
    let mut seq = 0u64;
    c.bench_function("validate_tap", |b| {
        b.iter(|| {
            seq += 1;
            clock.advance_ms(1);
            let event = TapEvent {
                player_id: PlayerId(seq % 10_000),
                client_timestamp_ms: 1_700_000_000_000,
                sequence_number: seq,
                nonce: format!("bench-{seq}"),
            };
            engine.validate_tap(black_box(&event), black_box(10.0))
        })
    });
}

fn bench_timing_model(c: &mut Criterion) {
    let model = TimingModel::from_config(&EngineConfig::default());
    let mut state = TimingState {
        last_arrival_ms: Some(0),
        ..TimingState::default()
    };
    for i in 0..MAX_RECENT_INTERVALS as u64 {
        state.push_interval(100 + i % 7);
    }

    c.bench_function("timing_analyze_full_window", |b| {
        b.iter(|| model.analyze(black_box(&state), black_box(120)))
    });
}

fn bench_sanction_tier(c: &mut Criterion) {
    c.bench_function("sanction_decision", |b| {
        b.iter(|| decision_for(black_box(72.5)))
    });
}

criterion_group!(benches, bench_validate_tap, bench_timing_model, bench_sanction_tier);
criterion_main!(benches);
