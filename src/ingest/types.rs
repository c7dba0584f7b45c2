// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Where an item originally came from. Social posts carry different
/// provenance than editorial news.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginKind {
    News,
    Social,
}

/// Loosely-structured item as a feed hands it over, before any filtering.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct RawFeedItem {
    pub title: String,
    pub url: String,
    pub source: String, // e.g. "Reuters", "Finnhub"
    pub published_at: DateTime<Utc>,
    pub body: String,
    pub origin: OriginKind,
}

/// Canonical article record produced by the normalizer, one per unique story
/// per run. `news_hash` is the global dedup key (80-bit truncated sha256 of
/// the canonical URL, falling back to the title).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Article {
    pub news_hash: String,
    pub title: String,
    pub source: String,
    pub source_domain: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub body: String,
    pub credibility: f64,
    pub origin: OriginKind,
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawFeedItem>>;
    fn name(&self) -> &'static str;
}
