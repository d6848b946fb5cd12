//! Trait interfaces for TapGuard.
//!
//! These traits define the seams between the engine and its environment:
//! - [`CounterStore`]: shared low-latency key-value store (tapguard-store implements)
//! - [`Clock`]: server-observed wall-clock time

use std::time::Duration;

use crate::error::StoreError;

/// Shared counter store holding every piece of per-player engine state.
///
/// All service instances see the same store, so each primitive must be atomic
/// with respect to its key. Keys expire after their TTL; an expired key
/// behaves exactly like an absent one.
pub trait CounterStore: Send + Sync {
    /// Read a value. Returns `None` if absent or expired.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Unconditionally write a value with a fresh TTL.
    fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;

    /// Write a value only if the key is absent or expired.
    ///
    /// Returns `true` if this call created the key.
    fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, StoreError>;

    /// Replace the value only if the current value equals `expected`
    /// (`None` meaning absent or expired). Refreshes the TTL on success.
    ///
    /// Returns `true` if the swap happened.
    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Atomically increment an integer counter and return the new count.
    ///
    /// The TTL is applied only when this call creates the key; later
    /// increments leave the original expiry untouched.
    fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError>;

    /// Remaining lifetime of a key, or `None` if absent or expired.
    fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Check whether a key is present and unexpired.
    ///
    /// Default implementation delegates to [`get`](Self::get).
    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Source of server-observed time in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;

    /// Current Unix second, used to key per-second rate windows.
    fn now_unix_secs(&self) -> i64 {
        self.now_ms().div_euclid(1000)
    }
}
