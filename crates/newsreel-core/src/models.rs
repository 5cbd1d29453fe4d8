use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Compute the content-identity key for a canonical URL: SHA-256 hex
/// of the trimmed URL string.
///
/// The URL is the only stable external identifier a source exposes
/// (titles repeat), so dedup is keyed on this value alone.
pub fn url_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A caller's subscription tier, determining the trigger cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Pro,
    Premium,
}

impl SubscriptionTier {
    /// Minimum interval between accepted ingestion triggers for this tier.
    pub fn cooldown(&self) -> TimeDelta {
        match self {
            SubscriptionTier::Free => TimeDelta::minutes(30),
            SubscriptionTier::Pro => TimeDelta::minutes(5),
            SubscriptionTier::Premium => TimeDelta::minutes(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Premium => "premium",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "pro" => Ok(SubscriptionTier::Pro),
            "premium" => Ok(SubscriptionTier::Premium),
            _ => Err(format!("Unknown subscription tier: {s}")),
        }
    }
}

/// A configured external origin to crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    /// Display name; also the key into the strategy registry (lowercased).
    pub name: String,
    /// Page to fetch each run.
    pub url: String,
    /// Optional extra container selector, tried before the registry's
    /// fallback list for this source.
    pub container_hint: Option<String>,
    pub enabled: bool,
    /// Scheduling hint for periodic crawls, in seconds.
    pub crawl_interval_secs: u32,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An unpersisted extraction result, prior to the dedup/insert decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCandidate {
    /// Trimmed title text from the title-link node.
    pub title: String,
    /// Absolute URL the title link resolves to.
    pub url: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Name of the source that produced this candidate.
    pub source: String,
    /// Extraction time. Pages rarely expose a reliable published time,
    /// so this doubles as the effective publish time.
    pub seen_at: DateTime<Utc>,
}

/// A deduplicated, stored news record. Immutable once stored: a re-crawl
/// that finds the same `url_key` is a no-op, never an update.
#[derive(Debug, Clone, Serialize)]
pub struct NewsItem {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    /// Content-identity key, see [`url_key`].
    pub url_key: String,
    pub source: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub crawled_at: DateTime<Utc>,
}

impl NewsItem {
    /// Build a storable item from a candidate, assigning a fresh id.
    pub fn from_candidate(candidate: ItemCandidate) -> Self {
        let key = url_key(&candidate.url);
        Self {
            id: Uuid::new_v4(),
            title: candidate.title,
            url: candidate.url,
            url_key: key,
            source: candidate.source,
            description: candidate.description,
            image_url: candidate.image_url,
            tags: Vec::new(),
            published_at: candidate.seen_at,
            crawled_at: candidate.seen_at,
        }
    }
}

/// Per-caller trigger state tracked by the rate gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateState {
    pub last_trigger: DateTime<Utc>,
    pub tier: SubscriptionTier,
}

/// Status of one orchestration run.
///
/// There is no whole-run `Failed`: a single source's failure is recorded
/// against that source and the run proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    CompletedWithErrors,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithErrors => "completed_with_errors",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-source counts for one run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: String,
    /// Candidates the extractor produced.
    pub found: usize,
    /// Candidates that were new and got stored.
    pub saved: usize,
    pub error: Option<String>,
}

/// Aggregate result of one orchestration pass across all enabled sources.
///
/// Ephemeral: retained only in the coordinator's bounded history.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Caller that triggered the run; `None` for administrative runs.
    pub triggered_by: Option<Uuid>,
    pub outcomes: Vec<SourceOutcome>,
}

impl RunSummary {
    pub fn total_found(&self) -> usize {
        self.outcomes.iter().map(|o| o.found).sum()
    }

    pub fn total_saved(&self) -> usize {
        self.outcomes.iter().map(|o| o.saved).sum()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}
