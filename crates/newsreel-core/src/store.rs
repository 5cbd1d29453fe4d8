//! In-memory keyed storage for items, sources, and per-caller rate state.
//!
//! The store is the single writer of all persisted entities and the dedup
//! boundary: [`NewsStore::try_insert`] is insert-if-absent on the
//! content-identity key, never overwrite-on-duplicate. Everything lives
//! in process memory; nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::SourceConfig;
use crate::models::{ItemCandidate, NewsItem, RateState, Source};

/// Filter for [`NewsStore::list_items`]. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Exact source name, case-insensitive.
    pub source: Option<String>,
    /// Case-insensitive substring over title and description.
    pub keyword: Option<String>,
    /// Only items published after this instant.
    pub since: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct StoreInner {
    /// Insertion-ordered; sources are never deleted during a run.
    sources: Vec<Source>,
    /// Items keyed by content-identity key.
    items: HashMap<String, NewsItem>,
    rate_states: HashMap<Uuid, RateState>,
}

/// Concurrent in-memory store. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct NewsStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl NewsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a source definition, idempotent by name
    /// (case-insensitive). An existing source keeps its id, insertion
    /// position, and `last_crawled_at`.
    pub async fn upsert_source(&self, config: &SourceConfig) -> Source {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .sources
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(&config.name))
        {
            existing.url = config.url.clone();
            existing.container_hint = config.container_hint.clone();
            existing.enabled = config.enabled;
            existing.crawl_interval_secs = config.crawl_interval_secs;
            return existing.clone();
        }

        let source = Source {
            id: Uuid::new_v4(),
            name: config.name.clone(),
            url: config.url.clone(),
            container_hint: config.container_hint.clone(),
            enabled: config.enabled,
            crawl_interval_secs: config.crawl_interval_secs,
            last_crawled_at: None,
            created_at: Utc::now(),
        };
        inner.sources.push(source.clone());
        source
    }

    /// Enabled sources in insertion order. Re-read each run rather than
    /// cached, since `enabled` may change between runs.
    pub async fn list_enabled_sources(&self) -> Vec<Source> {
        let inner = self.inner.read().await;
        inner.sources.iter().filter(|s| s.enabled).cloned().collect()
    }

    pub async fn list_sources(&self) -> Vec<Source> {
        self.inner.read().await.sources.clone()
    }

    pub async fn set_source_enabled(&self, id: Uuid, enabled: bool) {
        let mut inner = self.inner.write().await;
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == id) {
            source.enabled = enabled;
        }
    }

    pub async fn mark_source_crawled(&self, id: Uuid, at: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == id) {
            source.last_crawled_at = Some(at);
        }
    }

    /// Atomic insert-if-absent keyed on the candidate's content-identity
    /// key. Returns `(true, item)` when the candidate was new and stored,
    /// or `(false, existing)` with the original record untouched.
    ///
    /// Held under one write lock, so two sources (or two overlapping
    /// runs) producing the same URL cannot both insert.
    pub async fn try_insert(&self, candidate: ItemCandidate) -> (bool, NewsItem) {
        let key = crate::models::url_key(&candidate.url);
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.items.get(&key) {
            return (false, existing.clone());
        }
        let item = NewsItem::from_candidate(candidate);
        inner.items.insert(key, item.clone());
        (true, item)
    }

    /// Stored items matching `filter`, most-recent-first by publish time.
    pub async fn list_items(&self, filter: &ItemFilter) -> Vec<NewsItem> {
        let inner = self.inner.read().await;
        let keyword = filter.keyword.as_deref().map(str::to_lowercase);

        let mut items: Vec<NewsItem> = inner
            .items
            .values()
            .filter(|item| {
                if let Some(source) = &filter.source
                    && !item.source.eq_ignore_ascii_case(source)
                {
                    return false;
                }
                if let Some(keyword) = &keyword {
                    let in_title = item.title.to_lowercase().contains(keyword);
                    let in_desc = item
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(keyword));
                    if !in_title && !in_desc {
                        return false;
                    }
                }
                if let Some(since) = filter.since
                    && item.published_at <= since
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items
    }

    pub async fn item_count(&self) -> usize {
        self.inner.read().await.items.len()
    }

    // Rate state is a plain keyed read/write, last-write-wins; concurrent
    // triggers from the same caller are serialized by the rate gate, not
    // here.

    pub async fn rate_state(&self, caller: Uuid) -> Option<RateState> {
        self.inner.read().await.rate_states.get(&caller).copied()
    }

    pub async fn set_rate_state(&self, caller: Uuid, state: RateState) {
        self.inner.write().await.rate_states.insert(caller, state);
    }

    /// Administrative reset: restores first-ever-trigger semantics for
    /// one caller.
    pub async fn reset_rate_state(&self, caller: Uuid) {
        self.inner.write().await.rate_states.remove(&caller);
    }

    /// Administrative reset for all callers.
    pub async fn clear_rate_states(&self) {
        self.inner.write().await.rate_states.clear();
    }
}
