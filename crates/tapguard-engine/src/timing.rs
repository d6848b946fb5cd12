//! Timing analysis over server-observed inter-tap intervals.
//!
//! Two soft signals, neither of which rejects a tap on its own:
//!
//! * **Autoclicker**: the last [`AUTOCLICKER_WINDOW`] intervals are all
//!   below the human floor (`min_tap_interval_ms`): `+8`.
//! * **Perfect rhythm**: the variance of the last [`RHYTHM_WINDOW`]
//!   intervals is below `rhythm_variance_threshold_ms2`. Each such window
//!   extends a streak, each irregular window shortens it by one, and once the
//!   streak reaches `suspicious_pattern_threshold` every further low-variance
//!   window costs `+5`.
//!
//! A single tap therefore contributes a delta in `[0, 13]`.
//!
//! Arrival times come from the server [`Clock`], never from the client
//! timestamp.

use std::sync::Arc;

use tapguard_core::codec;
use tapguard_core::constants::{
    AUTOCLICKER_WINDOW, CAS_MAX_ATTEMPTS, PENALTY_AUTOCLICKER, PENALTY_PERFECT_RHYTHM,
    RHYTHM_WINDOW, TIMING_STATE_TTL,
};
use tapguard_core::keys;
use tapguard_core::{Clock, CounterStore, EngineConfig, PlayerId, StoreError, TimingState};
use tracing::{debug, warn};

/// Population variance of `values`, computed in one pass (Welford).
///
/// Returns `0.0` for an empty input.
pub fn variance<I>(values: I) -> f64
where
    I: IntoIterator<Item = u64>,
{
    let mut n = 0u64;
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    for v in values {
        n += 1;
        let x = v as f64;
        let d = x - mean;
        mean += d / n as f64;
        m2 += d * (x - mean);
    }
    if n == 0 { 0.0 } else { m2 / n as f64 }
}

/// Result of analysing one arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingAnalysis {
    /// Soft penalty contributed by this tap.
    pub delta: f64,
    /// Autoclicker signal fired.
    pub autoclicker: bool,
    /// Variance of the rhythm window, when enough intervals exist.
    pub rhythm_variance: Option<f64>,
    /// Perfect-rhythm penalty applied.
    pub perfect_rhythm: bool,
    /// State to persist after this tap.
    pub next: TimingState,
}

/// Pure timing rules. Holds only thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingModel {
    pub min_tap_interval_ms: u64,
    pub suspicious_pattern_threshold: u32,
    pub rhythm_variance_threshold_ms2: f64,
}

impl TimingModel {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            min_tap_interval_ms: config.min_tap_interval_ms,
            suspicious_pattern_threshold: config.suspicious_pattern_threshold,
            rhythm_variance_threshold_ms2: config.rhythm_variance_threshold_ms2,
        }
    }

    /// Fold an arrival at `now_ms` into `state` and score it.
    pub fn analyze(&self, state: &TimingState, now_ms: i64) -> TimingAnalysis {
        let mut next = state.clone();
        let mut delta = 0.0;
        let mut autoclicker = false;
        let mut rhythm_variance = None;
        let mut perfect_rhythm = false;

        if let Some(prev) = state.last_arrival_ms {
            // Instances may disagree on time by a few ms; never go negative.
            let interval = u64::try_from(now_ms.saturating_sub(prev)).unwrap_or(0);
            next.push_interval(interval);

            if let Some(mut tail) = next.trailing(AUTOCLICKER_WINDOW) {
                if tail.all(|i| i < self.min_tap_interval_ms) {
                    autoclicker = true;
                    delta += PENALTY_AUTOCLICKER;
                }
            }

            let window_variance = next.trailing(RHYTHM_WINDOW).map(variance);
            if let Some(var) = window_variance {
                rhythm_variance = Some(var);
                if var < self.rhythm_variance_threshold_ms2 {
                    next.perfect_rhythm_streak = next.perfect_rhythm_streak.saturating_add(1);
                    if next.perfect_rhythm_streak >= self.suspicious_pattern_threshold {
                        perfect_rhythm = true;
                        delta += PENALTY_PERFECT_RHYTHM;
                    }
                } else {
                    next.perfect_rhythm_streak = next.perfect_rhythm_streak.saturating_sub(1);
                }
            }
        }

        next.last_arrival_ms = Some(now_ms);

        TimingAnalysis {
            delta,
            autoclicker,
            rhythm_variance,
            perfect_rhythm,
            next,
        }
    }
}

/// Store-backed timing analyser.
///
/// State lives under one key per player with a sliding
/// [`TIMING_STATE_TTL`]; ten idle minutes reset the history.
pub struct TimingAnalyzer {
    model: TimingModel,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl TimingAnalyzer {
    pub fn new(model: TimingModel, store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            model,
            store,
            clock,
        }
    }

    pub fn model(&self) -> &TimingModel {
        &self.model
    }

    /// Record an arrival for `player` now and return its analysis.
    pub fn observe(&self, player: PlayerId) -> Result<TimingAnalysis, StoreError> {
        let key = keys::timing_key(player);

        for attempt in 1..=CAS_MAX_ATTEMPTS {
            let now = self.clock.now_ms();
            let current = self.store.get(&key)?;
            let state = match current.as_deref() {
                Some(bytes) => codec::decode::<TimingState>(&key, bytes).unwrap_or_else(|e| {
                    warn!(%player, error = %e, "timing: unreadable state, resetting");
                    TimingState::default()
                }),
                None => TimingState::default(),
            };

            let analysis = self.model.analyze(&state, now);
            let encoded = codec::encode(&key, &analysis.next)?;
            if self
                .store
                .compare_and_set(&key, current.as_deref(), &encoded, TIMING_STATE_TTL)?
            {
                if analysis.delta > 0.0 {
                    warn!(
                        %player,
                        delta = analysis.delta,
                        autoclicker = analysis.autoclicker,
                        perfect_rhythm = analysis.perfect_rhythm,
                        streak = analysis.next.perfect_rhythm_streak,
                        "timing: suspicious rhythm"
                    );
                } else {
                    debug!(%player, streak = analysis.next.perfect_rhythm_streak, "timing: arrival recorded");
                }
                return Ok(analysis);
            }
            debug!(%player, attempt, "timing: state CAS lost, retrying");
        }

        Err(StoreError::Contention { key })
    }
}

// =============================================================================
// Tests
// =============================================================================
