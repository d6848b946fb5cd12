//! Shared result type for the validation gates.

use tapguard_core::RejectReason;

/// What a single gate decided about a tap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateOutcome {
    /// The tap may continue, carrying `delta` onto the score.
    Pass { delta: f64 },
    /// Hard reject. Remaining gates are skipped.
    Reject { reason: RejectReason, delta: f64 },
}

impl GateOutcome {
    /// A pass with no penalty.
    pub const CLEAN: GateOutcome = GateOutcome::Pass { delta: 0.0 };

    pub fn delta(&self) -> f64 {
        match self {
            Self::Pass { delta } | Self::Reject { delta, .. } => *delta,
        }
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, Self::Reject { .. })
    }
}
