pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod rate;
pub mod store;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use config::{ExtractionHints, SourceConfig, StrategyRegistry, default_sources};
pub use coordinator::{CrawlStatus, RunCoordinator, TriggerOutcome};
pub use error::AppError;
pub use models::{ItemCandidate, NewsItem, RunStatus, RunSummary, Source, SubscriptionTier, url_key};
pub use orchestrator::CrawlOrchestrator;
pub use rate::RateGate;
pub use store::{ItemFilter, NewsStore};
pub use traits::{Extractor, Fetcher};
