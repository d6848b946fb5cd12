//! Replay guard: one-time nonces and monotonic sequence numbers.
//!
//! A nonce is consumed with a single atomic `set_if_absent`, so two copies of
//! the same tap racing each other cannot both pass. The last accepted
//! sequence number is advanced with compare-and-set; a lost race re-reads
//! the stored value and re-evaluates, which turns the loser into a
//! regression.

use std::sync::Arc;

use tapguard_core::codec;
use tapguard_core::constants::{
    CAS_MAX_ATTEMPTS, NONCE_TTL, PENALTY_NONCE_REPLAY, PENALTY_SEQUENCE_GAP,
    PENALTY_SEQUENCE_REPLAY, SEQUENCE_TTL,
};
use tapguard_core::keys;
use tapguard_core::{CounterStore, PlayerId, RejectReason, StoreError};
use tracing::{debug, warn};

use crate::gate::GateOutcome;

/// How an incoming sequence number relates to the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceDecision {
    /// Nothing stored (first tap, or the record expired). Accepted as the new baseline.
    Baseline,
    /// Exactly one past the stored value.
    InOrder,
    /// Ahead of the stored value by more than one.
    Gap { skipped: u64 },
    /// At or below the stored value. Legitimate clients never do this.
    Regression { last: u64 },
}

impl SequenceDecision {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Regression { .. })
    }

    pub fn delta(&self) -> f64 {
        match self {
            Self::Baseline | Self::InOrder => 0.0,
            Self::Gap { .. } => PENALTY_SEQUENCE_GAP,
            Self::Regression { .. } => PENALTY_SEQUENCE_REPLAY,
        }
    }

    pub fn outcome(&self) -> GateOutcome {
        if self.is_accepted() {
            GateOutcome::Pass { delta: self.delta() }
        } else {
            GateOutcome::Reject {
                reason: RejectReason::SequenceReplay,
                delta: self.delta(),
            }
        }
    }
}

/// Classify `incoming` against the last stored sequence number.
pub fn evaluate_sequence(incoming: u64, last: Option<u64>) -> SequenceDecision {
    match last {
        None => SequenceDecision::Baseline,
        Some(last) if incoming <= last => SequenceDecision::Regression { last },
        Some(last) if incoming == last + 1 => SequenceDecision::InOrder,
        Some(last) => SequenceDecision::Gap {
            skipped: incoming - last - 1,
        },
    }
}

/// Outcome of the nonce check given whether this call consumed the nonce.
pub fn evaluate_nonce(freshly_consumed: bool) -> GateOutcome {
    if freshly_consumed {
        GateOutcome::CLEAN
    } else {
        GateOutcome::Reject {
            reason: RejectReason::NonceReplay,
            delta: PENALTY_NONCE_REPLAY,
        }
    }
}

/// Store-backed replay guard.
pub struct ReplayGuard {
    store: Arc<dyn CounterStore>,
}

impl ReplayGuard {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Consume `nonce` for `player`. A nonce already consumed in the last
    /// [`NONCE_TTL`] is a replay.
    pub fn check_nonce(&self, player: PlayerId, nonce: &str) -> Result<GateOutcome, StoreError> {
        let key = keys::nonce_key(player, nonce);
        let fresh = self.store.set_if_absent(&key, b"1", NONCE_TTL)?;
        let outcome = evaluate_nonce(fresh);
        if outcome.is_reject() {
            warn!(%player, "replay_guard: nonce replay");
        }
        Ok(outcome)
    }

    /// Validate `sequence` against the stored last sequence and advance it.
    pub fn check_sequence(&self, player: PlayerId, sequence: u64) -> Result<GateOutcome, StoreError> {
        let key = keys::sequence_key(player);

        for attempt in 1..=CAS_MAX_ATTEMPTS {
            let current = self.store.get(&key)?;
            let last = match current.as_deref() {
                Some(bytes) => match codec::decode::<u64>(&key, bytes) {
                    Ok(last) => Some(last),
                    Err(e) => {
                        warn!(%player, error = %e, "replay_guard: unreadable sequence, rebaselining");
                        None
                    }
                },
                None => None,
            };

            let decision = evaluate_sequence(sequence, last);
            if !decision.is_accepted() {
                warn!(%player, sequence, ?last, "replay_guard: sequence replay");
                return Ok(decision.outcome());
            }

            let encoded = codec::encode(&key, &sequence)?;
            if self
                .store
                .compare_and_set(&key, current.as_deref(), &encoded, SEQUENCE_TTL)?
            {
                debug!(%player, sequence, ?decision, "replay_guard: sequence accepted");
                return Ok(decision.outcome());
            }
            debug!(%player, sequence, attempt, "replay_guard: sequence CAS lost, retrying");
        }

        Err(StoreError::Contention { key })
    }
}

// =============================================================================
// Tests
// =============================================================================
