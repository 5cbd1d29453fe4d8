//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests, keyed by
//! URL (fetcher) or source name (extractor) so multi-source runs can be
//! scripted per source. `Arc<Mutex<_>>` interior mutability keeps the
//! mocks `Clone` while tests hold their own handle for assertions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::config::ExtractionHints;
use crate::error::AppError;
use crate::models::{ItemCandidate, Source};
use crate::traits::{Extractor, Fetcher};

/// Mock fetcher returning scripted HTML (or errors) per URL.
///
/// URLs with no script return an empty page rather than failing, so
/// tests only script what they assert on.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Result<String, AppError>>>>,
    pub fetched: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(html.to_string()));
        self
    }

    pub fn with_error(self, url: &str, error: AppError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(error));
        self
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.fetched.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        match responses.remove(url) {
            Some(result) => result,
            None => Ok("<html><body></body></html>".to_string()),
        }
    }
}

/// Mock extractor returning scripted candidates (or errors) per source
/// name. Respects `max_items` by truncating, like the real extractor.
#[derive(Clone, Default)]
pub struct MockExtractor {
    by_source: Arc<Mutex<HashMap<String, Result<Vec<ItemCandidate>, AppError>>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(self, source: &str, candidates: Vec<ItemCandidate>) -> Self {
        self.by_source
            .lock()
            .unwrap()
            .insert(source.to_string(), Ok(candidates));
        self
    }

    pub fn with_error(self, source: &str, error: AppError) -> Self {
        self.by_source
            .lock()
            .unwrap()
            .insert(source.to_string(), Err(error));
        self
    }
}

impl Extractor for MockExtractor {
    fn extract(
        &self,
        source: &Source,
        _hints: &ExtractionHints,
        _html: &str,
        max_items: usize,
    ) -> Result<Vec<ItemCandidate>, AppError> {
        let mut by_source = self.by_source.lock().unwrap();
        match by_source.remove(&source.name) {
            Some(Ok(mut candidates)) => {
                candidates.truncate(max_items);
                Ok(candidates)
            }
            Some(Err(e)) => Err(e),
            None => Ok(Vec::new()),
        }
    }
}

/// Create a candidate for `url` attributed to `source`.
pub fn make_candidate(url: &str, source: &str) -> ItemCandidate {
    ItemCandidate {
        title: format!("headline {url}"),
        url: url.to_string(),
        description: None,
        image_url: None,
        source: source.to_string(),
        seen_at: Utc::now(),
    }
}

/// `count` distinct candidates for `source`, URLs suffixed 0..count.
pub fn make_candidates(source: &str, count: usize) -> Vec<ItemCandidate> {
    (0..count)
        .map(|i| make_candidate(&format!("https://{}.example/{i}", source.to_lowercase()), source))
        .collect()
}
