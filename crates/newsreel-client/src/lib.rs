//! Fetch backends and selector extraction.
//!
//! Two interchangeable [`Fetcher`](newsreel_core::Fetcher) backends:
//! [`ReqwestFetcher`] does a plain HTTP GET, [`BrowserFetcher`] (behind
//! the `browser` feature) renders the page in headless Chromium first.
//! Both feed the same [`SelectorExtractor`].

pub mod extractor;
pub mod fetcher;

#[cfg(feature = "browser")]
pub mod browser_fetcher;

pub use extractor::{SelectorExtractor, validate_hints, validate_selector};
pub use fetcher::ReqwestFetcher;

#[cfg(feature = "browser")]
pub use browser_fetcher::BrowserFetcher;
