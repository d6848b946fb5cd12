//! Engine constants. Durations are in milliseconds or seconds as named;
//! anomaly scores are dimensionless floats in `[0, 100]`.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Score bounds
// ---------------------------------------------------------------------------

/// Lowest possible anomaly score.
pub const MIN_SCORE: f64 = 0.0;

/// Highest possible anomaly score. Reaching it triggers the ban tier.
pub const MAX_SCORE: f64 = 100.0;

/// Score relief the caller applies for each accepted tap.
pub const ACCEPT_RELIEF: f64 = 0.5;

// ---------------------------------------------------------------------------
// Replay Guard
// ---------------------------------------------------------------------------

/// How long a consumed nonce stays consumed.
pub const NONCE_TTL: Duration = Duration::from_secs(120);

/// How long the last accepted sequence number is remembered.
///
/// After expiry any sequence number is accepted as a fresh baseline.
pub const SEQUENCE_TTL: Duration = Duration::from_secs(5 * 60);

/// Penalty for a nonce seen again inside [`NONCE_TTL`].
pub const PENALTY_NONCE_REPLAY: f64 = 20.0;

/// Penalty for a sequence number at or below the stored one.
pub const PENALTY_SEQUENCE_REPLAY: f64 = 30.0;

/// Penalty for a forward jump in the sequence (client reload, lost taps).
pub const PENALTY_SEQUENCE_GAP: f64 = 2.0;

/// Attempts made on a compare-and-set before reporting contention.
pub const CAS_MAX_ATTEMPTS: usize = 3;

// ---------------------------------------------------------------------------
// Rate Limiter
// ---------------------------------------------------------------------------

/// Default hard cap on taps per wall-clock second.
pub const DEFAULT_MAX_TAPS_PER_SECOND: u32 = 10;

/// Lifetime of a per-second rate window.
pub const RATE_WINDOW_TTL: Duration = Duration::from_secs(1);

/// Penalty for exceeding the per-second cap.
pub const PENALTY_RATE_EXCEEDED: f64 = 10.0;

// ---------------------------------------------------------------------------
// Timing Analyzer
// ---------------------------------------------------------------------------

/// Maximum number of inter-tap intervals retained per player.
pub const MAX_RECENT_INTERVALS: usize = 50;

/// Sliding inactivity window after which pattern state resets.
pub const TIMING_STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Number of trailing intervals inspected by the autoclicker check.
pub const AUTOCLICKER_WINDOW: usize = 5;

/// Number of trailing intervals whose variance feeds the rhythm check.
pub const RHYTHM_WINDOW: usize = 10;

/// Default autoclicker floor in milliseconds.
pub const DEFAULT_MIN_TAP_INTERVAL_MS: u64 = 50;

/// Default number of consecutive low-variance windows before penalizing.
pub const DEFAULT_SUSPICIOUS_PATTERN_THRESHOLD: u32 = 50;

/// Default variance (ms²) below which a window counts as perfect rhythm.
pub const DEFAULT_RHYTHM_VARIANCE_THRESHOLD_MS2: f64 = 100.0;

/// Penalty when the last [`AUTOCLICKER_WINDOW`] intervals are all too fast.
pub const PENALTY_AUTOCLICKER: f64 = 8.0;

/// Penalty while the perfect-rhythm streak is at or above the threshold.
pub const PENALTY_PERFECT_RHYTHM: f64 = 5.0;

// ---------------------------------------------------------------------------
// Client clock drift (opt-in gate)
// ---------------------------------------------------------------------------

/// Penalty for a client timestamp outside the configured drift allowance.
pub const PENALTY_TIMESTAMP_DRIFT: f64 = 2.0;

// ---------------------------------------------------------------------------
// Sanctions
// ---------------------------------------------------------------------------

/// Score at which the soft shadow-nerf tier begins.
pub const SOFT_SHADOW_NERF_SCORE: f64 = 40.0;

/// Score at which the cooldown tier begins.
pub const COOLDOWN_SCORE: f64 = 60.0;

/// Score at which shadow-nerf and the long cooldown combine.
pub const HARD_SANCTION_SCORE: f64 = 80.0;

/// Cooldown applied in the `[60, 80)` tier.
pub const SHORT_COOLDOWN: Duration = Duration::from_secs(60);

/// Cooldown applied from score 80 upward.
pub const LONG_COOLDOWN: Duration = Duration::from_secs(300);

/// Lifetime of a shadow-nerf record.
pub const SHADOW_NERF_TTL: Duration = Duration::from_secs(3600);

/// Reward multiplier applied while shadow-nerfed.
pub const SHADOW_NERF_REWARD_MULTIPLIER: f64 = 0.5;
