//! Trigger handling: rate-gate decisions, bounded background run
//! scheduling, and run-status reporting.
//!
//! A trigger returns as soon as the gate decision and trigger recording
//! complete; the run itself executes on a detached task gated by a
//! semaphore, so a burst of triggers cannot spawn unbounded concurrent
//! extraction work (or browser sessions). Once started, a run goes to
//! completion; there is no external cancel.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, Semaphore};
use uuid::Uuid;

use crate::models::{RunStatus, RunSummary, SubscriptionTier};
use crate::orchestrator::CrawlOrchestrator;
use crate::rate::RateGate;
use crate::traits::{Extractor, Fetcher};

/// Default ceiling on runs executing at once.
pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 2;

/// Summaries retained for status queries.
const RUN_HISTORY_LIMIT: usize = 20;

/// Result of a trigger request.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// Run accepted and scheduled; the id can be polled via
    /// [`RunCoordinator::run_summary`].
    Started { run_id: Uuid },
    /// Denied by the rate gate. Not an error: the caller is told the
    /// exact remaining wait.
    RateLimited { retry_in_secs: i64 },
}

/// Pure read of a caller's trigger standing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CrawlStatus {
    pub can_trigger: bool,
    pub retry_in_secs: i64,
    pub tier: SubscriptionTier,
}

pub struct RunCoordinator<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    orchestrator: CrawlOrchestrator<F, E>,
    gate: RateGate,
    permits: Arc<Semaphore>,
    history: Arc<RwLock<VecDeque<RunSummary>>>,
}

// Manual Clone: the derive would require F: Clone + E: Clone bounds the
// trait already guarantees.
impl<F: Fetcher, E: Extractor> Clone for RunCoordinator<F, E> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            gate: self.gate.clone(),
            permits: self.permits.clone(),
            history: self.history.clone(),
        }
    }
}

impl<F, E> RunCoordinator<F, E>
where
    F: Fetcher + 'static,
    E: Extractor + 'static,
{
    pub fn new(orchestrator: CrawlOrchestrator<F, E>, gate: RateGate) -> Self {
        Self::with_max_concurrent_runs(orchestrator, gate, DEFAULT_MAX_CONCURRENT_RUNS)
    }

    pub fn with_max_concurrent_runs(
        orchestrator: CrawlOrchestrator<F, E>,
        gate: RateGate,
        max_runs: usize,
    ) -> Self {
        Self {
            orchestrator,
            gate,
            permits: Arc::new(Semaphore::new(max_runs.max(1))),
            history: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// Caller-initiated trigger. Check and record are one atomic step,
    /// closing the race where two near-simultaneous triggers from the
    /// same caller both pass the check. On acceptance the run is
    /// scheduled and this returns immediately with the run id.
    ///
    /// `max_items` caps the candidates taken per source for this run
    /// only; pass [`DEFAULT_MAX_ITEMS`](crate::orchestrator::DEFAULT_MAX_ITEMS)
    /// when the caller has no preference.
    pub async fn trigger(
        &self,
        caller: Uuid,
        tier: SubscriptionTier,
        max_items: usize,
    ) -> TriggerOutcome {
        match self.gate.try_acquire(caller, tier).await {
            Ok(()) => {
                tracing::info!(%caller, %tier, max_items, "Crawl triggered");
                let run_id = self.spawn_run(Some(caller), max_items).await;
                TriggerOutcome::Started { run_id }
            }
            Err(retry_in_secs) => {
                tracing::warn!(%caller, %tier, retry_in_secs, "Trigger rate limited");
                TriggerOutcome::RateLimited { retry_in_secs }
            }
        }
    }

    /// Administrative trigger: bypasses the rate gate entirely.
    pub async fn trigger_admin(&self, max_items: usize) -> Uuid {
        tracing::info!(max_items, "Admin crawl triggered");
        self.spawn_run(None, max_items).await
    }

    /// Execute one run to completion on the caller's task, still gated
    /// by the concurrency ceiling. Used by one-shot (CLI) invocations
    /// that need the summary before the process exits.
    pub async fn run_once(&self, triggered_by: Option<Uuid>, max_items: usize) -> RunSummary {
        let run_id = Uuid::new_v4();
        self.push_pending(run_id, triggered_by).await;
        self.execute(run_id, triggered_by, max_items).await
    }

    /// Pure read against the rate gate; no side effects.
    pub async fn status(&self, caller: Uuid, tier: SubscriptionTier) -> CrawlStatus {
        CrawlStatus {
            can_trigger: self.gate.allow(caller, tier).await,
            retry_in_secs: self.gate.next_allowed_in_secs(caller, tier).await,
            tier,
        }
    }

    /// The most recently triggered run, if any.
    pub async fn latest_run(&self) -> Option<RunSummary> {
        self.history.read().await.back().cloned()
    }

    pub async fn run_summary(&self, run_id: Uuid) -> Option<RunSummary> {
        self.history
            .read()
            .await
            .iter()
            .find(|r| r.id == run_id)
            .cloned()
    }

    /// Bounded history of recent runs, oldest first.
    pub async fn run_history(&self) -> Vec<RunSummary> {
        self.history.read().await.iter().cloned().collect()
    }

    async fn spawn_run(&self, triggered_by: Option<Uuid>, max_items: usize) -> Uuid {
        let run_id = Uuid::new_v4();
        self.push_pending(run_id, triggered_by).await;

        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.execute(run_id, triggered_by, max_items).await;
        });
        run_id
    }

    async fn execute(&self, run_id: Uuid, triggered_by: Option<Uuid>, max_items: usize) -> RunSummary {
        // Closed semaphore is unreachable: the coordinator owns it and
        // never closes it.
        let _permit = self.permits.acquire().await;
        self.set_status(run_id, RunStatus::Running).await;

        // The per-trigger cap applies to this run only; the shared
        // orchestrator keeps its constructed default.
        let summary = self
            .orchestrator
            .clone()
            .with_max_items(max_items)
            .run(run_id, triggered_by)
            .await;
        self.finish(summary.clone()).await;
        summary
    }

    async fn push_pending(&self, run_id: Uuid, triggered_by: Option<Uuid>) {
        let mut history = self.history.write().await;
        history.push_back(RunSummary {
            id: run_id,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            triggered_by,
            outcomes: Vec::new(),
        });
        while history.len() > RUN_HISTORY_LIMIT {
            history.pop_front();
        }
    }

    async fn set_status(&self, run_id: Uuid, status: RunStatus) {
        let mut history = self.history.write().await;
        if let Some(run) = history.iter_mut().find(|r| r.id == run_id) {
            run.status = status;
        }
    }

    async fn finish(&self, summary: RunSummary) {
        let mut history = self.history.write().await;
        if let Some(run) = history.iter_mut().find(|r| r.id == summary.id) {
            *run = summary;
        } else {
            // Evicted by newer runs while executing; keep the result.
            history.push_back(summary);
        }
    }
}
