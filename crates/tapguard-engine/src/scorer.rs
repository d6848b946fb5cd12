//! Anomaly score accumulation.
//!
//! `new_score = clamp(old_score + Σ deltas, 0, 100)`. The engine only ever
//! adds; relief for accepted taps is the caller's call via [`relieve`].
//!
//! An incoming score outside `[0, 100]` (or NaN) is clamped *before* the
//! deltas are added, so `-25` plus `+30` yields `30`, not `5`. A stored
//! score is always in range, so this only matters for bad caller input,
//! which is never allowed to soften or amplify a penalty.

use tapguard_core::types::clamp_score;
use tapguard_core::{RejectReason, TapVerdict};

use crate::gate::GateOutcome;

/// Clamp `old + Σ deltas` into the score range.
pub fn apply_deltas(old_score: f64, deltas: &[f64]) -> f64 {
    let base = clamp_score(old_score);
    clamp_score(base + deltas.iter().sum::<f64>())
}

/// Caller-side relief for an accepted tap. Never called by the engine.
pub fn relieve(score: f64, amount: f64) -> f64 {
    clamp_score(clamp_score(score) - amount.max(0.0))
}

/// Running total of gate deltas for one validation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreLedger {
    base: f64,
    delta: f64,
}

impl ScoreLedger {
    pub fn new(current_score: f64) -> Self {
        Self {
            base: clamp_score(current_score),
            delta: 0.0,
        }
    }

    pub fn add(&mut self, delta: f64) {
        self.delta += delta;
    }

    /// Sum of deltas recorded so far.
    pub fn total_delta(&self) -> f64 {
        self.delta
    }

    /// Clamped score after the recorded deltas.
    pub fn score(&self) -> f64 {
        clamp_score(self.base + self.delta)
    }

    /// Record a gate outcome. Returns the rejection verdict if the gate
    /// hard-rejected so the caller can return early.
    pub fn record(&mut self, outcome: GateOutcome) -> Option<TapVerdict> {
        self.add(outcome.delta());
        match outcome {
            GateOutcome::Pass { .. } => None,
            GateOutcome::Reject { reason, .. } => Some(self.reject(reason)),
        }
    }

    pub fn reject(&self, reason: RejectReason) -> TapVerdict {
        TapVerdict::rejected(reason, self.total_delta(), self.score())
    }

    pub fn accept(&self) -> TapVerdict {
        TapVerdict::accepted(self.total_delta(), self.score())
    }
}
