//! Sanction tiers and time-boxed sanction records.
//!
//! The tier is a pure function of the current score. Applying a tier
//! writes (or refreshes) independent cooldown and shadow-nerf records whose
//! store TTL is their lifetime; nothing ever deletes them explicitly.
//! Game-action code asks [`SanctionManager::is_action_blocked`] and
//! [`SanctionManager::reward_multiplier`] before acting or paying out.
//!
//! A ban (score 100) is reported to the caller. Locking the account is the
//! account service's job.

use std::sync::Arc;
use std::time::Duration;

use tapguard_core::codec;
use tapguard_core::constants::{
    COOLDOWN_SCORE, HARD_SANCTION_SCORE, LONG_COOLDOWN, MAX_SCORE, SHADOW_NERF_REWARD_MULTIPLIER,
    SHADOW_NERF_TTL, SHORT_COOLDOWN, SOFT_SHADOW_NERF_SCORE,
};
use tapguard_core::keys;
use tapguard_core::types::clamp_score;
use tapguard_core::{
    ActiveSanctions, Clock, CounterStore, FailurePolicy, PlayerId, SanctionKind, SanctionOutcome,
    SanctionRecord, SanctionTier, StoreError,
};
use tracing::{debug, info, warn};

/// Map a score onto its sanction tier.
pub fn tier_for(score: f64) -> SanctionTier {
    let score = clamp_score(score);
    if score >= MAX_SCORE {
        SanctionTier::Ban
    } else if score >= HARD_SANCTION_SCORE {
        SanctionTier::HardShadowNerf
    } else if score >= COOLDOWN_SCORE {
        SanctionTier::Cooldown
    } else if score >= SOFT_SHADOW_NERF_SCORE {
        SanctionTier::SoftShadowNerf
    } else {
        SanctionTier::None
    }
}

/// What a tier imposes.
///
/// The ban tier keeps the hard restrictions in place as well, so the
/// player stays limited until the account lock lands.
pub fn outcome_for(tier: SanctionTier) -> SanctionOutcome {
    match tier {
        SanctionTier::None => SanctionOutcome::default(),
        SanctionTier::SoftShadowNerf => SanctionOutcome {
            shadow_nerf: true,
            ..SanctionOutcome::default()
        },
        SanctionTier::Cooldown => SanctionOutcome {
            cooldown_seconds: SHORT_COOLDOWN.as_secs(),
            ..SanctionOutcome::default()
        },
        SanctionTier::HardShadowNerf => SanctionOutcome {
            shadow_nerf: true,
            cooldown_seconds: LONG_COOLDOWN.as_secs(),
            ..SanctionOutcome::default()
        },
        SanctionTier::Ban => SanctionOutcome {
            shadow_nerf: true,
            cooldown_seconds: LONG_COOLDOWN.as_secs(),
            banned: true,
            review_required: true,
        },
    }
}

/// Shorthand for `outcome_for(tier_for(score))`.
pub fn decision_for(score: f64) -> SanctionOutcome {
    outcome_for(tier_for(score))
}

/// Writes and reads sanction records in the shared store.
pub struct SanctionManager {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    policy: FailurePolicy,
}

impl SanctionManager {
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, policy: FailurePolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Materialize the sanctions for `score` and return what was imposed.
    ///
    /// A record that cannot be written is logged; the returned outcome still
    /// describes the tier so the caller can act on it.
    pub fn apply(&self, player: PlayerId, score: f64) -> SanctionOutcome {
        let tier = tier_for(score);
        let outcome = outcome_for(tier);
        if tier == SanctionTier::None {
            debug!(%player, score, "sanctions: no sanction");
            return outcome;
        }

        let now = self.clock.now_ms();
        if outcome.shadow_nerf {
            self.write_record(player, SanctionKind::ShadowNerf, score, now, SHADOW_NERF_TTL);
        }
        if outcome.cooldown_seconds > 0 {
            let ttl = Duration::from_secs(outcome.cooldown_seconds);
            self.write_record(player, SanctionKind::Cooldown, score, now, ttl);
        }

        if outcome.banned {
            warn!(%player, score, "sanctions: ban threshold reached, manual review required");
        } else {
            info!(%player, score, ?tier, cooldown_secs = outcome.cooldown_seconds,
                shadow_nerf = outcome.shadow_nerf, "sanctions: applied");
        }
        outcome
    }

    fn write_record(&self, player: PlayerId, kind: SanctionKind, score: f64, now: i64, ttl: Duration) {
        let key = keys::sanction_key(player, kind);
        let record = SanctionRecord {
            kind,
            score: clamp_score(score),
            applied_at_ms: now,
            expires_at_ms: now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)),
        };
        let result = codec::encode(&key, &record)
            .and_then(|bytes| self.store.set_with_expiry(&key, &bytes, ttl));
        if let Err(e) = result {
            warn!(%player, kind = kind.as_str(), error = %e, "sanctions: failed to persist record");
        }
    }

    /// Remaining lifetime of each sanction kind.
    pub fn active(&self, player: PlayerId) -> Result<ActiveSanctions, StoreError> {
        Ok(ActiveSanctions {
            cooldown_remaining: self
                .store
                .ttl(&keys::sanction_key(player, SanctionKind::Cooldown))?,
            shadow_nerf_remaining: self
                .store
                .ttl(&keys::sanction_key(player, SanctionKind::ShadowNerf))?,
        })
    }

    /// The stored record of one kind, if still in force.
    pub fn record(&self, player: PlayerId, kind: SanctionKind) -> Result<Option<SanctionRecord>, StoreError> {
        let key = keys::sanction_key(player, kind);
        match self.store.get(&key)? {
            Some(bytes) => Ok(Some(codec::decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether a cooldown currently blocks the player's actions.
    pub fn is_action_blocked(&self, player: PlayerId) -> bool {
        match self.active(player) {
            Ok(active) => active.cooldown_remaining.is_some(),
            Err(e) => self.degraded(player, "is_action_blocked", &e),
        }
    }

    /// Reward multiplier: halved while shadow-nerfed.
    pub fn reward_multiplier(&self, player: PlayerId) -> f64 {
        let nerfed = match self.active(player) {
            Ok(active) => active.shadow_nerf_remaining.is_some(),
            Err(e) => self.degraded(player, "reward_multiplier", &e),
        };
        if nerfed { SHADOW_NERF_REWARD_MULTIPLIER } else { 1.0 }
    }

    /// Whether any sanction is in force.
    pub fn is_sanctioned(&self, player: PlayerId) -> bool {
        match self.active(player) {
            Ok(active) => !active.is_empty(),
            Err(e) => self.degraded(player, "is_sanctioned", &e),
        }
    }

    /// Answer a read check when the store is down: sanctioned only when failing closed.
    fn degraded(&self, player: PlayerId, check: &'static str, err: &StoreError) -> bool {
        warn!(%player, check, error = %err, policy = ?self.policy, "sanctions: store degraded");
        self.policy == FailurePolicy::FailClosed
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tapguard_core::ManualClock;
    use tapguard_store::MemoryCounterStore;

    fn make_manager() -> (Arc<ManualClock>, SanctionManager) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = Arc::new(MemoryCounterStore::new(clock.clone()));
        let mgr = SanctionManager::new(store, clock.clone(), FailurePolicy::FailOpen);
        (clock, mgr)
    }

    /// Tier boundaries are inclusive at the bottom, exclusive at the top.
    #[test]
    fn tier_boundaries() {
        assert_eq!(tier_for(0.0), SanctionTier::None);
        assert_eq!(tier_for(39.999), SanctionTier::None);
        assert_eq!(tier_for(40.0), SanctionTier::SoftShadowNerf);
        assert_eq!(tier_for(59.9), SanctionTier::SoftShadowNerf);
        assert_eq!(tier_for(60.0), SanctionTier::Cooldown);
        assert_eq!(tier_for(79.9), SanctionTier::Cooldown);
        assert_eq!(tier_for(80.0), SanctionTier::HardShadowNerf);
        assert_eq!(tier_for(99.99), SanctionTier::HardShadowNerf);
        assert_eq!(tier_for(100.0), SanctionTier::Ban);
        assert_eq!(tier_for(250.0), SanctionTier::Ban);
        assert_eq!(tier_for(f64::NAN), SanctionTier::None);
    }

    /// Each tier imposes the documented combination.
    #[test]
    fn tier_outcomes() {
        assert_eq!(decision_for(10.0), SanctionOutcome::default());
        assert_eq!(
            decision_for(45.0),
            SanctionOutcome { shadow_nerf: true, cooldown_seconds: 0, banned: false, review_required: false }
        );
        assert_eq!(
            decision_for(65.0),
            SanctionOutcome { shadow_nerf: false, cooldown_seconds: 60, banned: false, review_required: false }
        );
        assert_eq!(
            decision_for(85.0),
            SanctionOutcome { shadow_nerf: true, cooldown_seconds: 300, banned: false, review_required: false }
        );
        let ban = decision_for(100.0);
        assert!(ban.banned && ban.review_required);
    }

    /// A clean score writes nothing.
    #[test]
    fn clean_score_writes_nothing() {
        let (_clock, mgr) = make_manager();
        let p = PlayerId(1);
        mgr.apply(p, 12.0);
        assert!(!mgr.is_sanctioned(p));
        assert_eq!(mgr.reward_multiplier(p), 1.0);
    }

    /// Soft tier halves rewards for an hour without blocking.
    #[test]
    fn soft_shadow_nerf_lasts_an_hour() {
        let (clock, mgr) = make_manager();
        let p = PlayerId(2);

        let outcome = mgr.apply(p, 45.0);
        assert!(outcome.shadow_nerf);
        assert!(!mgr.is_action_blocked(p));
        assert_eq!(mgr.reward_multiplier(p), 0.5);

        let record = mgr.record(p, SanctionKind::ShadowNerf).unwrap().unwrap();
        assert_eq!(record.score, 45.0);
        assert_eq!(record.expires_at_ms - record.applied_at_ms, 3_600_000);

        clock.advance_ms(3_600_000);
        assert_eq!(mgr.reward_multiplier(p), 1.0);
        assert!(!mgr.is_sanctioned(p));
    }

    /// Cooldown tier blocks actions for sixty seconds.
    #[test]
    fn cooldown_blocks_then_expires() {
        let (clock, mgr) = make_manager();
        let p = PlayerId(3);

        mgr.apply(p, 70.0);
        assert!(mgr.is_action_blocked(p));
        assert_eq!(mgr.reward_multiplier(p), 1.0);
        assert_eq!(
            mgr.active(p).unwrap().cooldown_remaining,
            Some(Duration::from_secs(60))
        );

        clock.advance_ms(59_000);
        assert!(mgr.is_action_blocked(p));
        clock.advance_ms(1_000);
        assert!(!mgr.is_action_blocked(p));
    }

    /// Kinds expire independently.
    #[test]
    fn hard_tier_records_expire_independently() {
        let (clock, mgr) = make_manager();
        let p = PlayerId(4);

        mgr.apply(p, 90.0);
        assert!(mgr.is_action_blocked(p));
        assert_eq!(mgr.reward_multiplier(p), 0.5);

        clock.advance_ms(300_000);
        assert!(!mgr.is_action_blocked(p), "300s cooldown over");
        assert_eq!(mgr.reward_multiplier(p), 0.5, "shadow-nerf still active");
        assert!(mgr.is_sanctioned(p));
    }

    /// Re-applying refreshes the cooldown.
    #[test]
    fn reapply_refreshes_cooldown() {
        let (clock, mgr) = make_manager();
        let p = PlayerId(5);

        mgr.apply(p, 65.0);
        clock.advance_ms(50_000);
        mgr.apply(p, 66.0);
        clock.advance_ms(50_000);
        assert!(mgr.is_action_blocked(p));
    }

    /// A ban is reported and keeps the hard restrictions.
    #[test]
    fn ban_reported_with_restrictions() {
        let (_clock, mgr) = make_manager();
        let p = PlayerId(6);

        let outcome = mgr.apply(p, 100.0);
        assert!(outcome.banned);
        assert!(outcome.review_required);
        assert!(mgr.is_action_blocked(p));
        assert_eq!(mgr.reward_multiplier(p), 0.5);
    }
}
