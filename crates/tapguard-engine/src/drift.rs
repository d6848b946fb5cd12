//! Optional client clock drift gate.
//!
//! Rejects taps whose client-asserted timestamp is further than the
//! configured allowance from server time. Disabled unless
//! `max_client_drift_ms` is set.

use tapguard_core::RejectReason;
use tapguard_core::constants::PENALTY_TIMESTAMP_DRIFT;

use crate::gate::GateOutcome;

/// Compare the client timestamp with server time.
pub fn check_drift(client_timestamp_ms: i64, server_now_ms: i64, max_drift_ms: u64) -> GateOutcome {
    let drift = client_timestamp_ms.abs_diff(server_now_ms);
    if drift > max_drift_ms {
        GateOutcome::Reject {
            reason: RejectReason::TimestampDrift,
            delta: PENALTY_TIMESTAMP_DRIFT,
        }
    } else {
        GateOutcome::CLEAN
    }
}
