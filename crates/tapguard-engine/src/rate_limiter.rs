//! Per-player hard cap on taps per wall-clock second.
//!
//! Each `(player, unix_second)` pair owns a counter that the store
//! increments atomically and expires one second after creation. The
//! post-increment count is the only thing compared against the cap, so two
//! racing requests can never both observe a count below it.

use std::sync::Arc;

use tapguard_core::constants::{PENALTY_RATE_EXCEEDED, RATE_WINDOW_TTL};
use tapguard_core::keys;
use tapguard_core::{Clock, CounterStore, PlayerId, RejectReason, StoreError};
use tracing::{debug, warn};

use crate::gate::GateOutcome;

/// Decide from a post-increment count whether the tap fits under `cap`.
pub fn evaluate_count(count: i64, cap: u32) -> GateOutcome {
    if count > i64::from(cap) {
        GateOutcome::Reject {
            reason: RejectReason::RateExceeded,
            delta: PENALTY_RATE_EXCEEDED,
        }
    } else {
        GateOutcome::CLEAN
    }
}

/// Store-backed fixed-window rate limiter.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    max_taps_per_second: u32,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, max_taps_per_second: u32) -> Self {
        Self {
            store,
            clock,
            max_taps_per_second,
        }
    }

    pub fn max_taps_per_second(&self) -> u32 {
        self.max_taps_per_second
    }

    /// Count this tap against the current second and check the cap.
    pub fn check(&self, player: PlayerId) -> Result<GateOutcome, StoreError> {
        let second = self.clock.now_unix_secs();
        let key = keys::rate_key(player, second);
        let count = self.store.incr_with_expiry(&key, RATE_WINDOW_TTL)?;

        let outcome = evaluate_count(count, self.max_taps_per_second);
        if outcome.is_reject() {
            warn!(%player, count, limit = self.max_taps_per_second, "rate_limiter: rate exceeded");
        } else {
            debug!(%player, count, "rate_limiter: tap counted");
        }
        Ok(outcome)
    }
}

// =============================================================================
// Tests
// =============================================================================
