//! Shared builders and store doubles for the integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tapguard_core::{
    Clock, CounterStore, EngineConfig, ManualClock, PlayerId, StoreError, TapEvent,
};
use tapguard_engine::AntiCheatEngine;
use tapguard_store::MemoryCounterStore;

/// Session start. Sits 100 ms into a second so short bursts share one rate window.
pub const START_MS: i64 = 1_700_000_000_100;

/// A tap whose nonce is derived from player and sequence.
pub fn tap(player: u64, seq: u64) -> TapEvent {
    tap_with_nonce(player, seq, &format!("nonce-{player}-{seq}"))
}

/// A tap with an explicit nonce.
pub fn tap_with_nonce(player: u64, seq: u64, nonce: &str) -> TapEvent {
    TapEvent {
        player_id: PlayerId(player),
        client_timestamp_ms: START_MS,
        sequence_number: seq,
        nonce: nonce.to_string(),
    }
}

/// Clock, shared store, and an engine wired to both.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryCounterStore>,
    pub engine: AntiCheatEngine,
}

impl Harness {
    pub fn new(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        let store = Arc::new(MemoryCounterStore::new(clock.clone()));
        let engine = AntiCheatEngine::new(config, store.clone(), clock.clone());
        Self {
            clock,
            store,
            engine,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// A second engine instance over the same store and clock.
    pub fn sibling(&self, config: EngineConfig) -> AntiCheatEngine {
        AntiCheatEngine::new(config, self.store.clone(), self.clock.clone())
    }
}

/// Store that fails every call touching a key with a given prefix and
/// delegates the rest to an in-memory store.
pub struct FlakyStore {
    inner: MemoryCounterStore,
    failing_prefix: String,
    down: AtomicBool,
}

impl FlakyStore {
    pub fn new(clock: Arc<dyn Clock>, failing_prefix: &str) -> Self {
        Self {
            inner: MemoryCounterStore::new(clock),
            failing_prefix: failing_prefix.to_string(),
            down: AtomicBool::new(true),
        }
    }

    /// Toggle the outage on or off.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn guard(&self, key: &str) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) && key.starts_with(&self.failing_prefix) {
            Err(StoreError::Unavailable(format!("injected outage on {key}")))
        } else {
            Ok(())
        }
    }
}

impl CounterStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.guard(key)?;
        self.inner.get(key)
    }

    fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.guard(key)?;
        self.inner.set_with_expiry(key, value, ttl)
    }

    fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, StoreError> {
        self.guard(key)?;
        self.inner.set_if_absent(key, value, ttl)
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.guard(key)?;
        self.inner.compare_and_set(key, expected, value, ttl)
    }

    fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        self.guard(key)?;
        self.inner.incr_with_expiry(key, ttl)
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.guard(key)?;
        self.inner.ttl(key)
    }
}
