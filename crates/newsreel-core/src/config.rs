//! Source definitions and per-source extraction strategies.
//!
//! Sources are seeded at process start (or loaded from a JSON file);
//! the strategy registry is a closed mapping from known source names to
//! the selector fallback lists used against their markup. Unknown names
//! are warned about at load time and skipped at run time.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Ordered selector fallback lists for one source's markup.
///
/// For each list, the first selector that yields any matches wins;
/// the rest are never consulted. Lists mirror the shape drift seen on
/// the real sites, which restyle their listing pages without notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionHints {
    /// Candidate container nodes (one per potential item).
    pub containers: Vec<String>,
    /// Title-link node within a container.
    pub titles: Vec<String>,
    /// Optional short description within a container.
    pub descriptions: Vec<String>,
}

/// Closed mapping from source name (lowercased) to extraction hints.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, ExtractionHints>,
}

impl StrategyRegistry {
    /// Registry covering the reference deployment's three sources.
    pub fn builtin() -> Self {
        let mut strategies = HashMap::new();
        strategies.insert(
            "cafef".to_string(),
            ExtractionHints {
                containers: vec![
                    "article".into(),
                    ".item-news".into(),
                    ".box-category-item".into(),
                    ".list-news-subfolder li".into(),
                    ".tlitem".into(),
                ],
                titles: vec![
                    "h3 a".into(),
                    "h2 a".into(),
                    "h4 a".into(),
                    ".title a".into(),
                    "a[title]".into(),
                ],
                descriptions: vec![".sapo".into(), ".description".into(), "p".into()],
            },
        );
        strategies.insert(
            "vietstock".to_string(),
            ExtractionHints {
                containers: vec![
                    ".news-item".into(),
                    "article".into(),
                    ".box-news li".into(),
                    ".list-news li".into(),
                ],
                titles: vec![
                    "h3 a".into(),
                    "h2 a".into(),
                    ".title a".into(),
                    "a[title]".into(),
                ],
                descriptions: vec![".description".into(), ".sapo".into(), "p".into()],
            },
        );
        strategies.insert(
            "ssi".to_string(),
            ExtractionHints {
                containers: vec![
                    ".news-item".into(),
                    "article".into(),
                    ".box-news li".into(),
                    ".list-news li".into(),
                ],
                titles: vec![
                    "h3 a".into(),
                    "h2 a".into(),
                    ".title a".into(),
                    "a[title]".into(),
                ],
                descriptions: vec![".description".into(), ".summary".into(), "p".into()],
            },
        );
        Self { strategies }
    }

    /// Look up hints by source name, case-insensitively.
    pub fn hints_for(&self, source_name: &str) -> Option<&ExtractionHints> {
        self.strategies.get(&source_name.to_lowercase())
    }

    pub fn known_names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// Register (or replace) hints for a source name.
    pub fn register(&mut self, name: &str, hints: ExtractionHints) {
        self.strategies.insert(name.to_lowercase(), hints);
    }
}

/// Definition of a source as configured, before the store assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub container_hint: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub crawl_interval_secs: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u32 {
    300
}

/// The reference deployment's seeded sources.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "CafeF".into(),
            url: "https://cafef.vn/chung-khoan.chn".into(),
            container_hint: None,
            enabled: true,
            crawl_interval_secs: 300,
        },
        SourceConfig {
            name: "VietStock".into(),
            url: "https://vietstock.vn/".into(),
            container_hint: None,
            enabled: true,
            crawl_interval_secs: 300,
        },
        SourceConfig {
            name: "SSI".into(),
            url: "https://www.ssi.com.vn/".into(),
            container_hint: None,
            enabled: true,
            crawl_interval_secs: 300,
        },
    ]
}

/// Load source definitions from a JSON file (an array of [`SourceConfig`]).
///
/// Sources with no registry entry are kept but warned about: they will be
/// skipped with zero candidates at run time rather than rejected here.
pub fn load_sources(path: &Path, registry: &StrategyRegistry) -> Result<Vec<SourceConfig>, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::ConfigError(format!("Failed to read {}: {e}", path.display())))?;
    let sources: Vec<SourceConfig> = serde_json::from_str(&raw)?;

    for source in &sources {
        if registry.hints_for(&source.name).is_none() {
            tracing::warn!(
                source = %source.name,
                "No extraction strategy registered; source will be skipped at run time"
            );
        }
    }

    Ok(sources)
}
