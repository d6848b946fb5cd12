//! Domain types for tap validation and sanctions.
//!
//! [`TapEvent`] and [`TapVerdict`] are the transient per-call contract.
//! [`TimingState`] and [`SanctionRecord`] are the per-player records kept in
//! the shared [`CounterStore`](crate::traits::CounterStore).

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_RECENT_INTERVALS, MAX_SCORE, MIN_SCORE};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque player identifier assigned by the account service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Tap input / output
// ---------------------------------------------------------------------------

/// One client tap as received by the server. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapEvent {
    /// Player submitting the tap.
    pub player_id: PlayerId,
    /// Client-asserted Unix time in milliseconds. Untrusted.
    pub client_timestamp_ms: i64,
    /// Client-maintained monotonic counter.
    pub sequence_number: u64,
    /// One-time random token supplied by the client.
    pub nonce: String,
}

/// Per-call validation input: the tap plus the player's current score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapRequest {
    #[serde(flatten)]
    pub event: TapEvent,
    pub current_anomaly_score: f64,
}

/// Hard-reject reason codes surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    #[serde(rename = "nonce replay")]
    NonceReplay,
    #[serde(rename = "sequence replay")]
    SequenceReplay,
    #[serde(rename = "rate exceeded")]
    RateExceeded,
    #[serde(rename = "timestamp drift")]
    TimestampDrift,
    #[serde(rename = "store unavailable")]
    StoreUnavailable,
}

impl RejectReason {
    /// Stable string code for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonceReplay => "nonce replay",
            Self::SequenceReplay => "sequence replay",
            Self::RateExceeded => "rate exceeded",
            Self::TimestampDrift => "timestamp drift",
            Self::StoreUnavailable => "store unavailable",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one tap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapVerdict {
    pub is_valid: bool,
    pub reason: Option<RejectReason>,
    /// Sum of every delta recorded during this call, up to and including
    /// the rejecting gate. A sequence gap (+2) followed by a rate reject
    /// (+10) reports 12. Unclamped.
    pub anomaly_delta: f64,
    /// `clamp(current + anomaly_delta)`, with an out-of-range current score
    /// clamped first.
    pub new_anomaly_score: f64,
}

impl TapVerdict {
    /// An accepted tap carrying the soft penalties it accumulated.
    pub fn accepted(anomaly_delta: f64, new_anomaly_score: f64) -> Self {
        Self {
            is_valid: true,
            reason: None,
            anomaly_delta,
            new_anomaly_score,
        }
    }

    /// A hard rejection.
    pub fn rejected(reason: RejectReason, anomaly_delta: f64, new_anomaly_score: f64) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
            anomaly_delta,
            new_anomaly_score,
        }
    }

    /// Verdict returned when the engine is switched off: valid, no delta,
    /// score untouched.
    pub fn passthrough(current_score: f64) -> Self {
        Self::accepted(0.0, current_score)
    }
}

// ---------------------------------------------------------------------------
// Timing pattern state
// ---------------------------------------------------------------------------

/// Rolling timing history for one player.
///
/// # Invariants
///
/// * `recent_intervals.len() <= MAX_RECENT_INTERVALS`, oldest first.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TimingState {
    /// Server arrival time of the previous accepted tap (Unix ms).
    pub last_arrival_ms: Option<i64>,
    /// Inter-arrival deltas in milliseconds.
    pub recent_intervals: VecDeque<u64>,
    /// Consecutive low-variance windows, decayed by one per irregular window.
    pub perfect_rhythm_streak: u32,
}

impl TimingState {
    /// Append an interval, evicting the oldest once the window is full.
    pub fn push_interval(&mut self, interval_ms: u64) {
        if self.recent_intervals.len() == MAX_RECENT_INTERVALS {
            self.recent_intervals.pop_front();
        }
        self.recent_intervals.push_back(interval_ms);
    }

    /// The last `n` intervals, oldest first, or `None` if fewer are recorded.
    pub fn trailing(&self, n: usize) -> Option<impl Iterator<Item = u64> + '_> {
        let len = self.recent_intervals.len();
        if n == 0 || len < n {
            return None;
        }
        Some(self.recent_intervals.iter().skip(len - n).copied())
    }
}

// ---------------------------------------------------------------------------
// Sanctions
// ---------------------------------------------------------------------------

/// Kinds of time-boxed sanction record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum SanctionKind {
    /// Player cannot act until the record expires.
    Cooldown,
    /// Rewards are silently reduced until the record expires.
    ShadowNerf,
}

impl SanctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cooldown => "cooldown",
            Self::ShadowNerf => "shadow_nerf",
        }
    }
}

/// Stored body of a sanction record. Expiry itself is enforced by the store TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct SanctionRecord {
    pub kind: SanctionKind,
    /// Score that triggered the record.
    pub score: f64,
    pub applied_at_ms: i64,
    pub expires_at_ms: i64,
}

/// Score band a player currently falls into.
///
/// | score range | tier |
/// |-------------|------|
/// | `[0, 40)`   | [`None`](SanctionTier::None) |
/// | `[40, 60)`  | [`SoftShadowNerf`](SanctionTier::SoftShadowNerf) |
/// | `[60, 80)`  | [`Cooldown`](SanctionTier::Cooldown) |
/// | `[80, 100)` | [`HardShadowNerf`](SanctionTier::HardShadowNerf) |
/// | `100`       | [`Ban`](SanctionTier::Ban) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionTier {
    None,
    SoftShadowNerf,
    Cooldown,
    HardShadowNerf,
    Ban,
}

/// Result of a sanction query/apply call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SanctionOutcome {
    pub shadow_nerf: bool,
    pub cooldown_seconds: u64,
    pub banned: bool,
    pub review_required: bool,
}

/// Sanctions currently in force for a player, read back from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveSanctions {
    pub cooldown_remaining: Option<Duration>,
    pub shadow_nerf_remaining: Option<Duration>,
}

impl ActiveSanctions {
    pub fn is_empty(&self) -> bool {
        self.cooldown_remaining.is_none() && self.shadow_nerf_remaining.is_none()
    }
}

/// Clamp a score into `[MIN_SCORE, MAX_SCORE]`. NaN is treated as `MIN_SCORE`.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return MIN_SCORE;
    }
    score.clamp(MIN_SCORE, MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_interval_evicts_oldest() {
        let mut state = TimingState::default();
        for i in 0..(MAX_RECENT_INTERVALS as u64 + 5) {
            state.push_interval(i);
        }
        assert_eq!(state.recent_intervals.len(), MAX_RECENT_INTERVALS);
        assert_eq!(state.recent_intervals.front(), Some(&5));
        assert_eq!(
            state.recent_intervals.back(),
            Some(&(MAX_RECENT_INTERVALS as u64 + 4))
        );
    }

    #[test]
    fn trailing_requires_enough_history() {
        let mut state = TimingState::default();
        state.push_interval(10);
        state.push_interval(20);
        assert!(state.trailing(3).is_none());
        assert!(state.trailing(0).is_none());

        state.push_interval(30);
        let tail: Vec<u64> = state.trailing(2).unwrap().collect();
        assert_eq!(tail, vec![20, 30]);
    }

    #[test]
    fn reject_reason_serializes_as_code() {
        let json = serde_json::to_string(&RejectReason::NonceReplay).unwrap();
        assert_eq!(json, "\"nonce replay\"");
        assert_eq!(RejectReason::RateExceeded.to_string(), "rate exceeded");
    }

    #[test]
    fn tap_request_flattens_event() {
        let line = r#"{"player_id":7,"client_timestamp_ms":1000,"sequence_number":3,"nonce":"n-3","current_anomaly_score":12.5}"#;
        let req: TapRequest = serde_json::from_str(line).unwrap();
        assert_eq!(req.event.player_id, PlayerId(7));
        assert_eq!(req.event.sequence_number, 3);
        assert_eq!(req.current_anomaly_score, 12.5);
    }

    #[test]
    fn clamp_score_bounds_and_nan() {
        assert_eq!(clamp_score(-4.0), 0.0);
        assert_eq!(clamp_score(250.0), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(f64::INFINITY), 100.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }

    #[test]
    fn passthrough_keeps_score() {
        let v = TapVerdict::passthrough(63.0);
        assert!(v.is_valid);
        assert_eq!(v.anomaly_delta, 0.0);
        assert_eq!(v.new_anomaly_score, 63.0);
        assert!(v.reason.is_none());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn clamp_always_in_bounds(score in proptest::num::f64::ANY) {
                let clamped = clamp_score(score);
                prop_assert!((MIN_SCORE..=MAX_SCORE).contains(&clamped));
            }

            #[test]
            fn interval_window_never_overflows(
                intervals in proptest::collection::vec(0u64..10_000, 0..200)
            ) {
                let mut state = TimingState::default();
                for i in &intervals {
                    state.push_interval(*i);
                }
                prop_assert!(state.recent_intervals.len() <= MAX_RECENT_INTERVALS);
                let keep = intervals.len().min(MAX_RECENT_INTERVALS);
                let expected: Vec<u64> = intervals[intervals.len() - keep..].to_vec();
                let actual: Vec<u64> = state.recent_intervals.iter().copied().collect();
                prop_assert_eq!(actual, expected);
            }
        }
    }
}
