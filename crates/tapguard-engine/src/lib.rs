//! # tapguard-engine: Tap anti-cheat and anomaly-scoring pipeline.
//!
//! Every gate keeps its decision logic in a pure function over its inputs
//! and the current stored state, and applies the resulting patch through the
//! injected [`CounterStore`](tapguard_core::CounterStore):
//! - **Replay guard**: one-time nonces and monotonic sequence numbers.
//! - **Rate limiter**: hard per-second cap keyed by wall-clock second.
//! - **Timing analyzer**: autoclicker and perfect-rhythm detection over a
//!   rolling window of server-observed intervals.
//! - **Anomaly scorer**: clamped accumulation of gate deltas.
//! - **Sanction manager**: score tiers mapped to time-boxed cooldown and
//!   shadow-nerf records.
//!
//! [`AntiCheatEngine`] wires them together in the fixed order
//! replay → rate → (drift) → timing.

pub mod drift;
pub mod engine;
pub mod gate;
pub mod rate_limiter;
pub mod replay;
pub mod sanction;
pub mod scorer;
pub mod timing;

pub use engine::AntiCheatEngine;
pub use gate::GateOutcome;
pub use rate_limiter::RateLimiter;
pub use replay::{ReplayGuard, SequenceDecision};
pub use sanction::SanctionManager;
pub use scorer::ScoreLedger;
pub use timing::{TimingAnalysis, TimingAnalyzer, TimingModel};
