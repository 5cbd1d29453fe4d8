//! Per-caller trigger cooldowns keyed by subscription tier.
//!
//! Free waits 30 minutes between ingestion triggers, Pro 5, Premium 1.
//! A first-ever trigger is always allowed. The gate, not the store,
//! serializes concurrent triggers from the same caller: the combined
//! check-and-record in [`RateGate::try_acquire`] runs under one lock so
//! two near-simultaneous triggers cannot both pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{RateState, SubscriptionTier};
use crate::store::NewsStore;

#[derive(Clone)]
pub struct RateGate {
    store: NewsStore,
    /// Serializes trigger decisions across callers. Held only for the
    /// duration of a map read plus a map write; contention is irrelevant
    /// at trigger rates bounded by minutes-long cooldowns.
    trigger_lock: Arc<Mutex<()>>,
}

impl RateGate {
    pub fn new(store: NewsStore) -> Self {
        Self {
            store,
            trigger_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Whether `caller` may trigger a run right now.
    pub async fn allow(&self, caller: Uuid, tier: SubscriptionTier) -> bool {
        self.allow_at(caller, tier, Utc::now()).await
    }

    pub(crate) async fn allow_at(
        &self,
        caller: Uuid,
        tier: SubscriptionTier,
        now: DateTime<Utc>,
    ) -> bool {
        match self.store.rate_state(caller).await {
            None => true,
            Some(state) => now >= state.last_trigger + tier.cooldown(),
        }
    }

    /// Whole seconds until `caller` may trigger again; 0 when already
    /// allowed.
    pub async fn next_allowed_in_secs(&self, caller: Uuid, tier: SubscriptionTier) -> i64 {
        self.next_allowed_in_secs_at(caller, tier, Utc::now()).await
    }

    pub(crate) async fn next_allowed_in_secs_at(
        &self,
        caller: Uuid,
        tier: SubscriptionTier,
        now: DateTime<Utc>,
    ) -> i64 {
        match self.store.rate_state(caller).await {
            None => 0,
            Some(state) => {
                let next_allowed = state.last_trigger + tier.cooldown();
                (next_allowed - now).num_seconds().max(0)
            }
        }
    }

    /// Record an accepted trigger at the acceptance time — never the
    /// request time, so clock skew cannot shorten the cooldown.
    pub async fn record_trigger(&self, caller: Uuid, tier: SubscriptionTier) {
        self.record_trigger_at(caller, tier, Utc::now()).await;
    }

    pub(crate) async fn record_trigger_at(
        &self,
        caller: Uuid,
        tier: SubscriptionTier,
        at: DateTime<Utc>,
    ) {
        self.store
            .set_rate_state(
                caller,
                RateState {
                    last_trigger: at,
                    tier,
                },
            )
            .await;
    }

    /// Atomic check-and-record. On acceptance the trigger is recorded
    /// before returning; on denial nothing changes and the remaining
    /// wait in whole seconds is returned.
    pub async fn try_acquire(&self, caller: Uuid, tier: SubscriptionTier) -> Result<(), i64> {
        let _guard = self.trigger_lock.lock().await;
        let now = Utc::now();
        if self.allow_at(caller, tier, now).await {
            self.record_trigger_at(caller, tier, now).await;
            Ok(())
        } else {
            Err(self.next_allowed_in_secs_at(caller, tier, now).await)
        }
    }

    /// Administrative reset for one caller: next trigger behaves as the
    /// first ever.
    pub async fn reset(&self, caller: Uuid) {
        self.store.reset_rate_state(caller).await;
        tracing::info!(%caller, "Rate limit reset");
    }

    /// Administrative reset for all callers.
    pub async fn reset_all(&self) {
        self.store.clear_rate_states().await;
        tracing::info!("All rate limits cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn gate() -> RateGate {
        RateGate::new(NewsStore::new())
    }

    #[tokio::test]
    async fn first_trigger_is_always_allowed() {
        let gate = gate();
        let caller = Uuid::new_v4();
        for tier in [
            SubscriptionTier::Free,
            SubscriptionTier::Pro,
            SubscriptionTier::Premium,
        ] {
            assert!(gate.allow(caller, tier).await);
            assert_eq!(gate.next_allowed_in_secs(caller, tier).await, 0);
        }
    }

    #[tokio::test]
    async fn cooldown_is_monotonic_for_fixed_tier() {
        let gate = gate();
        let caller = Uuid::new_v4();
        let tier = SubscriptionTier::Pro; // 5 minutes
        let t0 = Utc::now();

        gate.record_trigger_at(caller, tier, t0).await;

        // Denied strictly inside (t0, t0 + 5min).
        assert!(!gate.allow_at(caller, tier, t0 + TimeDelta::seconds(1)).await);
        assert!(!gate.allow_at(caller, tier, t0 + TimeDelta::seconds(299)).await);
        // Allowed at and after the boundary.
        assert!(gate.allow_at(caller, tier, t0 + TimeDelta::seconds(300)).await);
        assert!(gate.allow_at(caller, tier, t0 + TimeDelta::seconds(301)).await);

        // Remaining wait strictly decreases toward the boundary.
        let w1 = gate
            .next_allowed_in_secs_at(caller, tier, t0 + TimeDelta::seconds(10))
            .await;
        let w2 = gate
            .next_allowed_in_secs_at(caller, tier, t0 + TimeDelta::seconds(200))
            .await;
        assert_eq!(w1, 290);
        assert_eq!(w2, 100);
        assert!(w2 < w1);
        assert_eq!(
            gate.next_allowed_in_secs_at(caller, tier, t0 + TimeDelta::seconds(300))
                .await,
            0
        );
    }

    #[tokio::test]
    async fn free_tier_scenario_t0_t600_t1800() {
        let gate = gate();
        let caller = Uuid::new_v4();
        let tier = SubscriptionTier::Free;
        let t0 = Utc::now();

        // t=0: accepted.
        assert!(gate.allow_at(caller, tier, t0).await);
        gate.record_trigger_at(caller, tier, t0).await;

        // t=600s: denied, exactly 1200s remaining.
        let t600 = t0 + TimeDelta::seconds(600);
        assert!(!gate.allow_at(caller, tier, t600).await);
        assert_eq!(gate.next_allowed_in_secs_at(caller, tier, t600).await, 1200);

        // t=1800s: accepted.
        let t1800 = t0 + TimeDelta::seconds(1800);
        assert!(gate.allow_at(caller, tier, t1800).await);
    }

    #[tokio::test]
    async fn tier_upgrade_shortens_wait_for_same_history() {
        let gate = gate();
        let caller = Uuid::new_v4();
        let t0 = Utc::now();
        gate.record_trigger_at(caller, SubscriptionTier::Free, t0).await;

        let at = t0 + TimeDelta::seconds(90);
        let free = gate
            .next_allowed_in_secs_at(caller, SubscriptionTier::Free, at)
            .await;
        let pro = gate
            .next_allowed_in_secs_at(caller, SubscriptionTier::Pro, at)
            .await;
        let premium = gate
            .next_allowed_in_secs_at(caller, SubscriptionTier::Premium, at)
            .await;
        assert!(premium <= pro && pro <= free);
        assert_eq!(premium, 0); // 1-minute cooldown already elapsed
    }

    #[tokio::test]
    async fn try_acquire_admits_exactly_one_concurrent_trigger() {
        let gate = gate();
        let caller = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                gate.try_acquire(caller, SubscriptionTier::Free).await.is_ok()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn try_acquire_denial_has_no_side_effects() {
        let gate = gate();
        let caller = Uuid::new_v4();

        gate.try_acquire(caller, SubscriptionTier::Free).await.unwrap();
        let before = gate.store.rate_state(caller).await.unwrap();

        let err = gate.try_acquire(caller, SubscriptionTier::Free).await.unwrap_err();
        assert!(err > 0 && err <= 1800);

        let after = gate.store.rate_state(caller).await.unwrap();
        assert_eq!(before.last_trigger, after.last_trigger);
    }

    #[tokio::test]
    async fn reset_restores_first_trigger_semantics() {
        let gate = gate();
        let caller = Uuid::new_v4();
        let tier = SubscriptionTier::Free;

        gate.try_acquire(caller, tier).await.unwrap();
        assert!(!gate.allow(caller, tier).await);

        gate.reset(caller).await;
        assert!(gate.allow(caller, tier).await);
        assert_eq!(gate.next_allowed_in_secs(caller, tier).await, 0);
    }

    #[tokio::test]
    async fn reset_all_clears_every_caller() {
        let gate = gate();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        gate.try_acquire(a, SubscriptionTier::Free).await.unwrap();
        gate.try_acquire(b, SubscriptionTier::Pro).await.unwrap();

        gate.reset_all().await;
        assert!(gate.allow(a, SubscriptionTier::Free).await);
        assert!(gate.allow(b, SubscriptionTier::Pro).await);
    }
}
