use std::future::Future;

use crate::config::ExtractionHints;
use crate::error::AppError;
use crate::models::{ItemCandidate, Source};

/// Fetches a rendered page for a source URL.
///
/// The two production backends are interchangeable per-run choices:
/// a plain HTTP fetch (cheap, no script execution) and a headless
/// browser render (expensive, handles script-built markup). Both hand
/// the orchestrator the same thing: the page HTML as a string.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns one fetched page into an ordered sequence of item candidates.
///
/// The orchestrator resolves `hints` from the strategy registry before
/// calling; `max_items` caps the output, taken in document order.
pub trait Extractor: Send + Sync + Clone {
    fn extract(
        &self,
        source: &Source,
        hints: &ExtractionHints,
        html: &str,
        max_items: usize,
    ) -> Result<Vec<ItemCandidate>, AppError>;
}
