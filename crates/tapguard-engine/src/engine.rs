//! The tap validation pipeline.
//!
//! Gates run in a fixed order and the first hard reject ends the call:
//!
//! 1. replay guard (nonce, then sequence)
//! 2. rate limiter
//! 3. client drift gate, when configured
//! 4. timing analyzer (soft only)
//!
//! There is no transaction across gates. A nonce consumed before a later
//! gate rejects stays consumed, since it already stood for one real client
//! event.
//!
//! The engine holds no per-player state of its own; everything lives in the
//! injected [`CounterStore`], so any number of instances can share one store.

use std::sync::Arc;

use tapguard_core::{
    Clock, CounterStore, EngineConfig, FailurePolicy, PlayerId, RejectReason, SanctionOutcome,
    StoreError, TapEvent, TapRequest, TapVerdict,
};
use tracing::{debug, error, warn};

use crate::drift::check_drift;
use crate::gate::GateOutcome;
use crate::rate_limiter::RateLimiter;
use crate::replay::ReplayGuard;
use crate::sanction::SanctionManager;
use crate::scorer::ScoreLedger;
use crate::timing::{TimingAnalyzer, TimingModel};

/// Anti-cheat engine: one instance per process, shared across requests.
pub struct AntiCheatEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    replay: ReplayGuard,
    rate: RateLimiter,
    timing: TimingAnalyzer,
    sanctions: SanctionManager,
}

impl AntiCheatEngine {
    /// Build the pipeline over a shared store and clock.
    pub fn new(config: EngineConfig, store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        let replay = ReplayGuard::new(store.clone());
        let rate = RateLimiter::new(store.clone(), clock.clone(), config.max_taps_per_second);
        let timing = TimingAnalyzer::new(TimingModel::from_config(&config), store.clone(), clock.clone());
        let sanctions = SanctionManager::new(store, clock.clone(), config.store_failure_policy);
        Self {
            config,
            clock,
            replay,
            rate,
            timing,
            sanctions,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-side sanction checks for game-action code.
    pub fn sanctions(&self) -> &SanctionManager {
        &self.sanctions
    }

    /// Validate a request carrying its own current score.
    pub fn validate(&self, request: &TapRequest) -> TapVerdict {
        self.validate_tap(&request.event, request.current_anomaly_score)
    }

    /// Run `event` through every gate and score the result.
    pub fn validate_tap(&self, event: &TapEvent, current_score: f64) -> TapVerdict {
        if !self.config.anti_cheat_enabled {
            return TapVerdict::passthrough(current_score);
        }

        let player = event.player_id;
        let mut ledger = ScoreLedger::new(current_score);

        let nonce = self.resolve(player, "nonce", self.replay.check_nonce(player, &event.nonce));
        if let Some(verdict) = ledger.record(nonce) {
            return self.finish(player, verdict);
        }

        let sequence = self.resolve(
            player,
            "sequence",
            self.replay.check_sequence(player, event.sequence_number),
        );
        if let Some(verdict) = ledger.record(sequence) {
            return self.finish(player, verdict);
        }

        let rate = self.resolve(player, "rate", self.rate.check(player));
        if let Some(verdict) = ledger.record(rate) {
            return self.finish(player, verdict);
        }

        if let Some(max_drift_ms) = self.config.max_client_drift_ms {
            let drift = check_drift(event.client_timestamp_ms, self.clock.now_ms(), max_drift_ms);
            if drift.is_reject() {
                warn!(%player, client_ts = event.client_timestamp_ms, max_drift_ms, "engine: client clock drift");
            }
            if let Some(verdict) = ledger.record(drift) {
                return self.finish(player, verdict);
            }
        }

        let timing = self.resolve(
            player,
            "timing",
            self.timing
                .observe(player)
                .map(|analysis| GateOutcome::Pass { delta: analysis.delta }),
        );
        if let Some(verdict) = ledger.record(timing) {
            return self.finish(player, verdict);
        }

        self.finish(player, ledger.accept())
    }

    /// Materialize sanctions for the player's resulting score.
    pub fn apply_sanctions(&self, player: PlayerId, score: f64) -> SanctionOutcome {
        self.sanctions.apply(player, score)
    }

    /// Map a gate's store result through the configured failure policy.
    ///
    /// Contention is not an outage: the store answered every call, and each
    /// lost compare-and-set round re-read a state in which this tap was
    /// acceptable. The gate is skipped under either policy.
    fn resolve(
        &self,
        player: PlayerId,
        gate: &'static str,
        result: Result<GateOutcome, StoreError>,
    ) -> GateOutcome {
        match result {
            Ok(outcome) => outcome,
            Err(StoreError::Contention { key }) => {
                warn!(%player, gate, %key, "engine: store contended, gate skipped");
                GateOutcome::CLEAN
            }
            Err(e) => match self.config.store_failure_policy {
                FailurePolicy::FailOpen => {
                    warn!(%player, gate, error = %e, "engine: store degraded, failing open");
                    GateOutcome::CLEAN
                }
                FailurePolicy::FailClosed => {
                    error!(%player, gate, error = %e, "engine: store degraded, failing closed");
                    GateOutcome::Reject {
                        reason: RejectReason::StoreUnavailable,
                        delta: 0.0,
                    }
                }
            },
        }
    }

    fn finish(&self, player: PlayerId, verdict: TapVerdict) -> TapVerdict {
        debug!(
            %player,
            valid = verdict.is_valid,
            reason = verdict.reason.map(|r| r.as_str()),
            delta = verdict.anomaly_delta,
            score = verdict.new_anomaly_score,
            "engine: verdict"
        );
        verdict
    }
}

// =============================================================================
// Tests
// =============================================================================
