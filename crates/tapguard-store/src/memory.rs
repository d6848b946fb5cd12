//! In-memory [`CounterStore`] backed by a sharded concurrent map.
//!
//! # Design
//!
//! Entries live in a [`DashMap`]. Every primitive that reads and then writes
//! a key goes through the map's entry API, which holds the key's shard lock
//! for the whole operation, so check-and-write sequences are atomic per key.
//! Expiry is evaluated against an injected [`Clock`]: an expired entry is
//! indistinguishable from an absent one and is evicted lazily on access.
//!
//! Most keys are written once and never read again (one nonce per tap, one
//! rate counter per player-second), so lazy eviction alone would let the map
//! grow without bound. The first write in each new wall-clock second sweeps
//! the whole map with [`MemoryCounterStore::purge_expired`], which keeps the
//! resident set close to the live set.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tapguard_core::error::StoreError;
use tapguard_core::traits::{Clock, CounterStore};
use tracing::trace;

/// A stored value with its absolute expiry.
#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at_ms: i64,
}

impl StoredValue {
    fn new(bytes: Vec<u8>, now_ms: i64, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            bytes,
            expires_at_ms: now_ms.saturating_add(ttl_ms),
        }
    }

    fn is_live(&self, now_ms: i64) -> bool {
        self.expires_at_ms > now_ms
    }
}

/// Process-local shared store. Clone the surrounding `Arc` to share it
/// between engine instances.
pub struct MemoryCounterStore {
    entries: DashMap<String, StoredValue>,
    clock: Arc<dyn Clock>,
    /// Unix second of the last sweep.
    last_sweep_sec: AtomicI64,
}

impl MemoryCounterStore {
    /// Create an empty store that evaluates expiry against `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            last_sweep_sec: AtomicI64::new(i64::MIN),
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, v| v.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            trace!(removed, "memory_store: purged expired entries");
        }
        removed
    }

    /// Sweep if `now_ms` falls in a second not yet swept. Only one caller
    /// per second wins the swap and pays for the sweep.
    ///
    /// Must be called before taking any entry guard: `retain` locks every
    /// shard in turn.
    fn maybe_sweep(&self, now_ms: i64) {
        let second = now_ms.div_euclid(1000);
        let last = self.last_sweep_sec.load(Ordering::Relaxed);
        if second == last {
            return;
        }
        if self
            .last_sweep_sec
            .compare_exchange(last, second, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.purge_expired();
        }
    }

    /// Number of entries held in memory, expired or not.
    pub fn resident_len(&self) -> usize {
        self.entries.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now_ms();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn parse_counter(key: &str, bytes: &[u8]) -> Result<i64, StoreError> {
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| StoreError::Corrupt {
                key: key.to_string(),
                reason: "counter is not a decimal integer".into(),
            })
    }
}

impl CounterStore for MemoryCounterStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now_ms();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.bytes.clone()));
            }
        }
        self.entries.remove_if(key, |_, v| !v.is_live(now));
        Ok(None)
    }

    fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);
        self.entries
            .insert(key.to_string(), StoredValue::new(value.to_vec(), now, ttl));
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, StoreError> {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                if occ.get().is_live(now) {
                    return Ok(false);
                }
                occ.insert(StoredValue::new(value.to_vec(), now, ttl));
                Ok(true)
            }
            Entry::Vacant(vac) => {
                vac.insert(StoredValue::new(value.to_vec(), now, ttl));
                Ok(true)
            }
        }
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                let current = occ
                    .get()
                    .is_live(now)
                    .then(|| occ.get().bytes.as_slice());
                if current != expected {
                    return Ok(false);
                }
                occ.insert(StoredValue::new(value.to_vec(), now, ttl));
                Ok(true)
            }
            Entry::Vacant(vac) => {
                if expected.is_some() {
                    return Ok(false);
                }
                vac.insert(StoredValue::new(value.to_vec(), now, ttl));
                Ok(true)
            }
        }
    }

    fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let now = self.clock.now_ms();
        self.maybe_sweep(now);
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                if !occ.get().is_live(now) {
                    occ.insert(StoredValue::new(b"1".to_vec(), now, ttl));
                    return Ok(1);
                }
                let count = Self::parse_counter(key, &occ.get().bytes)?.saturating_add(1);
                // Keep the original expiry; only the creating call sets it.
                occ.get_mut().bytes = count.to_string().into_bytes();
                Ok(count)
            }
            Entry::Vacant(vac) => {
                vac.insert(StoredValue::new(b"1".to_vec(), now, ttl));
                Ok(1)
            }
        }
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = self.clock.now_ms();
        Ok(self.entries.get(key).and_then(|v| {
            v.is_live(now)
                .then(|| Duration::from_millis((v.expires_at_ms - now) as u64))
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================
