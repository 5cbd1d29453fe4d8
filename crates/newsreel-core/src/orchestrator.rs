//! One orchestration pass across all enabled sources.
//!
//! The failure-isolation contract lives here: every per-source error is
//! caught at the source boundary and recorded in that source's outcome,
//! so one misbehaving source never blocks ingestion from the others.

use chrono::Utc;
use uuid::Uuid;

use crate::config::StrategyRegistry;
use crate::error::AppError;
use crate::models::{RunStatus, RunSummary, Source, SourceOutcome};
use crate::store::NewsStore;
use crate::traits::{Extractor, Fetcher};

/// Default cap on candidates taken per source per run.
pub const DEFAULT_MAX_ITEMS: usize = 15;

/// Sequences sources, invokes the extractor, and feeds candidates
/// through the store's dedup gate. Generic over the fetch backend and
/// the extractor, so runs are wired with either the static or the
/// rendering backend and tests inject mocks.
#[derive(Clone)]
pub struct CrawlOrchestrator<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    fetcher: F,
    extractor: E,
    registry: StrategyRegistry,
    store: NewsStore,
    max_items: usize,
}

impl<F, E> CrawlOrchestrator<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    pub fn new(fetcher: F, extractor: E, registry: StrategyRegistry, store: NewsStore) -> Self {
        Self {
            fetcher,
            extractor,
            registry,
            store,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn store(&self) -> &NewsStore {
        &self.store
    }

    /// Run one pass over a snapshot of the enabled sources.
    ///
    /// The snapshot is taken once at run start; sources toggled mid-run
    /// do not join or leave this run. Never returns an error: per-source
    /// failures end up in the summary's outcomes.
    pub async fn run(&self, run_id: Uuid, triggered_by: Option<Uuid>) -> RunSummary {
        let started_at = Utc::now();
        let sources = self.store.list_enabled_sources().await;
        tracing::info!(%run_id, "Starting crawl for {} enabled sources", sources.len());

        let mut outcomes = Vec::with_capacity(sources.len());
        for source in &sources {
            outcomes.push(self.crawl_source(source).await);
        }

        let status = if outcomes.iter().any(|o| o.error.is_some()) {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        };

        let summary = RunSummary {
            id: run_id,
            status,
            started_at,
            finished_at: Some(Utc::now()),
            triggered_by,
            outcomes,
        };
        tracing::info!(
            %run_id,
            status = %summary.status,
            found = summary.total_found(),
            saved = summary.total_saved(),
            errors = summary.error_count(),
            "Crawl completed"
        );
        summary
    }

    async fn crawl_source(&self, source: &Source) -> SourceOutcome {
        // Unknown source name: logged and skipped with zero candidates,
        // not an error that would flip the run status.
        let Some(hints) = self.registry.hints_for(&source.name) else {
            tracing::warn!(source = %source.name, "Unknown source, skipping");
            return SourceOutcome {
                source: source.name.clone(),
                found: 0,
                saved: 0,
                error: None,
            };
        };

        let mut hints = hints.clone();
        if let Some(hint) = &source.container_hint {
            hints.containers.insert(0, hint.clone());
        }

        tracing::info!(source = %source.name, url = %source.url, "Crawling source");

        match self.fetch_and_ingest(source, &hints).await {
            Ok((found, saved)) => {
                self.store.mark_source_crawled(source.id, Utc::now()).await;
                tracing::info!(
                    source = %source.name,
                    "Crawled {found} news items ({saved} new items saved)"
                );
                SourceOutcome {
                    source: source.name.clone(),
                    found,
                    saved,
                    error: None,
                }
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!(source = %source.name, error = %e, "Source crawl failed");
                } else {
                    tracing::error!(source = %source.name, error = %e, "Source crawl failed");
                }
                SourceOutcome {
                    source: source.name.clone(),
                    found: 0,
                    saved: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn fetch_and_ingest(
        &self,
        source: &Source,
        hints: &crate::config::ExtractionHints,
    ) -> Result<(usize, usize), AppError> {
        let html = self.fetcher.fetch(&source.url).await?;
        let candidates = self
            .extractor
            .extract(source, hints, &html, self.max_items)?;

        let found = candidates.len();
        let mut saved = 0;
        for candidate in candidates {
            let (stored, item) = self.store.try_insert(candidate).await;
            if stored {
                saved += 1;
                tracing::debug!(source = %source.name, title = %item.title, "Saved news item");
            }
        }
        Ok((found, saved))
    }
}
