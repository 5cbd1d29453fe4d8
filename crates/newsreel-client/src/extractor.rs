//! Selector-based candidate extraction, shared by both fetch backends.
//!
//! The backends differ only in how the page HTML is obtained; selection
//! works on the resulting markup either way. Selector hints are ordered
//! fallback lists: the listing pages of the covered sites get restyled
//! without notice, so each lookup tries progressively more generic
//! selectors until one matches.

use chrono::Utc;
use newsreel_core::config::ExtractionHints;
use newsreel_core::error::AppError;
use newsreel_core::models::{ItemCandidate, Source};
use newsreel_core::traits::Extractor;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Stateless extractor over a parsed HTML tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorExtractor;

impl SelectorExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for SelectorExtractor {
    fn extract(
        &self,
        source: &Source,
        hints: &ExtractionHints,
        html: &str,
        max_items: usize,
    ) -> Result<Vec<ItemCandidate>, AppError> {
        let document = Html::parse_document(html);
        let base = Url::parse(&source.url).ok();
        let now = Utc::now();

        let containers = first_matching_all(&document, &hints.containers);
        tracing::debug!(source = %source.name, "Found {} candidate containers", containers.len());

        let mut candidates = Vec::new();
        for container in containers {
            // Cap reached: stop immediately, do not over-fetch.
            if candidates.len() >= max_items {
                break;
            }

            // No qualifying title link means this container is not an
            // item (an ad slot, a section header); skip silently.
            let Some((title, url)) = title_link(container, &hints.titles, base.as_ref()) else {
                continue;
            };

            let description = first_text(container, &hints.descriptions);
            let image_url = image_url(container, base.as_ref());

            candidates.push(ItemCandidate {
                title,
                url,
                description,
                image_url,
                source: source.name.clone(),
                seen_at: now,
            });
        }

        Ok(candidates)
    }
}

/// Check a single CSS selector parses. Run at configuration load so a
/// typo fails at startup instead of silently matching nothing at run
/// time. Covers per-source `container_hint` overrides as well as
/// registry hint sets.
pub fn validate_selector(selector: &str) -> Result<(), AppError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| AppError::ConfigError(format!("Invalid selector '{selector}': {e}")))
}

/// Check every selector in a hint set parses.
pub fn validate_hints(hints: &ExtractionHints) -> Result<(), AppError> {
    let all = hints
        .containers
        .iter()
        .chain(&hints.titles)
        .chain(&hints.descriptions);
    for selector in all {
        validate_selector(selector)?;
    }
    Ok(())
}

/// All matches of the first selector in `fallbacks` that matches anything.
fn first_matching_all<'a>(document: &'a Html, fallbacks: &[String]) -> Vec<ElementRef<'a>> {
    for raw in fallbacks {
        let Ok(selector) = Selector::parse(raw) else {
            tracing::debug!(selector = %raw, "Skipping unparseable selector");
            continue;
        };
        let matches: Vec<ElementRef<'a>> = document.select(&selector).collect();
        if !matches.is_empty() {
            return matches;
        }
    }
    Vec::new()
}

/// First match of the first selector in `fallbacks` that matches within
/// `scope`.
fn first_matching<'a>(scope: ElementRef<'a>, fallbacks: &[String]) -> Option<ElementRef<'a>> {
    for raw in fallbacks {
        let Ok(selector) = Selector::parse(raw) else {
            tracing::debug!(selector = %raw, "Skipping unparseable selector");
            continue;
        };
        if let Some(element) = scope.select(&selector).next() {
            return Some(element);
        }
    }
    None
}

/// Resolve the container's title link to (trimmed title, absolute URL).
///
/// Returns `None` when the title text is empty or the href is absent,
/// relative with no usable base, or not http(s) — the container is then
/// skipped, not an error.
fn title_link(
    container: ElementRef<'_>,
    fallbacks: &[String],
    base: Option<&Url>,
) -> Option<(String, String)> {
    let link = first_matching(container, fallbacks)?;
    let title = collect_text(link);
    if title.is_empty() {
        return None;
    }
    let href = link.value().attr("href")?;
    let url = absolutize(href, base)?;
    Some((title, url))
}

/// Trimmed text of the first matching element, `None` when empty.
fn first_text(container: ElementRef<'_>, fallbacks: &[String]) -> Option<String> {
    let element = first_matching(container, fallbacks)?;
    let text = collect_text(element);
    if text.is_empty() { None } else { Some(text) }
}

/// Image URL from the container's first `<img>`: `src`, falling back to
/// the lazy-load `data-src` attribute.
fn image_url(container: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    let img_selector = Selector::parse("img").ok()?;
    let img = container.select(&img_selector).next()?;
    let raw = match img.value().attr("src").filter(|s| !s.trim().is_empty()) {
        Some(src) => src,
        None => img.value().attr("data-src")?,
    };
    absolutize(raw, base)
}

fn collect_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Make a URL absolute against `base`, rejecting anything that does not
/// end up as http(s).
fn absolutize(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let resolved = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => base?.join(raw).ok()?,
    };
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn test_source() -> Source {
        Source {
            id: Uuid::new_v4(),
            name: "CafeF".into(),
            url: "https://cafef.vn/chung-khoan.chn".into(),
            container_hint: None,
            enabled: true,
            crawl_interval_secs: 300,
            last_crawled_at: None,
            created_at: Utc::now(),
        }
    }

    fn hints() -> ExtractionHints {
        ExtractionHints {
            containers: vec![".item-news".into(), "article".into()],
            titles: vec!["h3 a".into(), "a[title]".into()],
            descriptions: vec![".sapo".into(), "p".into()],
        }
    }

    fn extract(html: &str, max_items: usize) -> Vec<ItemCandidate> {
        SelectorExtractor::new()
            .extract(&test_source(), &hints(), html, max_items)
            .unwrap()
    }

    #[test]
    fn extracts_title_url_description_and_image() {
        let html = r#"
            <article>
              <h3><a href="https://cafef.vn/tin-1.chn">  VN-Index climbs  </a></h3>
              <p class="sapo">Banks lead the session.</p>
              <img src="https://cafef.vn/img/1.jpg">
            </article>
        "#;
        let candidates = extract(html, 15);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.title, "VN-Index climbs");
        assert_eq!(c.url, "https://cafef.vn/tin-1.chn");
        assert_eq!(c.description.as_deref(), Some("Banks lead the session."));
        assert_eq!(c.image_url.as_deref(), Some("https://cafef.vn/img/1.jpg"));
        assert_eq!(c.source, "CafeF");
    }

    #[test]
    fn container_fallback_uses_first_selector_that_matches() {
        // No .item-news anywhere, so the article fallback is used.
        let html = r#"
            <article><h3><a href="https://x/a">A</a></h3></article>
            <article><h3><a href="https://x/b">B</a></h3></article>
        "#;
        let candidates = extract(html, 15);
        assert_eq!(candidates.len(), 2);

        // .item-news present: article elements are no longer consulted.
        let html = r#"
            <div class="item-news"><h3><a href="https://x/c">C</a></h3></div>
            <article><h3><a href="https://x/d">D</a></h3></article>
        "#;
        let candidates = extract(html, 15);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://x/c");
    }

    #[test]
    fn title_fallback_cascades_to_attr_selector() {
        let html = r#"
            <article>
              <a title="t" href="https://x/a">From attr selector</a>
            </article>
        "#;
        let candidates = extract(html, 15);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "From attr selector");
    }

    #[test]
    fn skips_container_without_title_link() {
        let html = r#"
            <article><span>just an ad slot</span></article>
            <article><h3><a href="https://x/real">Real story</a></h3></article>
        "#;
        let candidates = extract(html, 15);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://x/real");
    }

    #[test]
    fn skips_container_with_empty_title_text() {
        let html = r#"<article><h3><a href="https://x/a">   </a></h3></article>"#;
        assert!(extract(html, 15).is_empty());
    }

    #[test]
    fn resolves_relative_urls_against_source_page() {
        let html = r#"<article><h3><a href="/tin-2.chn">Relative</a></h3></article>"#;
        let candidates = extract(html, 15);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://cafef.vn/tin-2.chn");
    }

    #[test]
    fn rejects_missing_and_non_http_urls() {
        let html = r#"
            <article><h3><a>No href at all</a></h3></article>
            <article><h3><a href="javascript:void(0)">Script link</a></h3></article>
            <article><h3><a href="mailto:desk@cafef.vn">Mail link</a></h3></article>
        "#;
        assert!(extract(html, 15).is_empty());
    }

    #[test]
    fn image_falls_back_to_lazy_load_attribute() {
        let html = r#"
            <article>
              <h3><a href="https://x/a">Lazy image</a></h3>
              <img data-src="/img/lazy.jpg">
            </article>
        "#;
        let candidates = extract(html, 15);
        assert_eq!(
            candidates[0].image_url.as_deref(),
            Some("https://cafef.vn/img/lazy.jpg")
        );
    }

    #[test]
    fn empty_src_defers_to_data_src() {
        let html = r#"
            <article>
              <h3><a href="https://x/a">Blank src</a></h3>
              <img src="" data-src="https://cdn.x/i.jpg">
            </article>
        "#;
        let candidates = extract(html, 15);
        assert_eq!(candidates[0].image_url.as_deref(), Some("https://cdn.x/i.jpg"));
    }

    #[test]
    fn missing_description_is_none() {
        let html = r#"<article><h3><a href="https://x/a">Bare</a></h3></article>"#;
        let candidates = extract(html, 15);
        assert!(candidates[0].description.is_none());
    }

    #[test]
    fn caps_at_max_items_in_document_order() {
        let mut html = String::new();
        for i in 0..50 {
            html.push_str(&format!(
                r#"<article><h3><a href="https://x/{i}">Story {i}</a></h3></article>"#
            ));
        }
        let candidates = extract(&html, 15);
        assert_eq!(candidates.len(), 15);
        assert_eq!(candidates[0].url, "https://x/0");
        assert_eq!(candidates[14].url, "https://x/14");
    }

    #[test]
    fn max_items_zero_yields_nothing() {
        let html = r#"<article><h3><a href="https://x/a">A</a></h3></article>"#;
        assert!(extract(html, 0).is_empty());
    }

    #[test]
    fn no_matching_containers_is_empty_not_error() {
        let candidates = extract("<html><body><div>nothing here</div></body></html>", 15);
        assert!(candidates.is_empty());
    }

    #[test]
    fn validate_hints_accepts_builtin_registry() {
        let registry = newsreel_core::StrategyRegistry::builtin();
        for name in registry.known_names() {
            validate_hints(registry.hints_for(name).unwrap()).unwrap();
        }
    }

    #[test]
    fn validate_selector_checks_one_selector() {
        validate_selector(".box-category-item li").unwrap();
        let err = validate_selector("[[").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn validate_hints_rejects_bad_selector() {
        let bad = ExtractionHints {
            containers: vec!["article".into(), "[[".into()],
            titles: vec!["a".into()],
            descriptions: vec![],
        };
        let err = validate_hints(&bad).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
