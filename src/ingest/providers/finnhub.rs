use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;

use crate::ingest::types::{FeedProvider, OriginKind, RawFeedItem};

/// Categories pulled per fetch — covers stocks, M&A, crypto and macro.
const CATEGORIES: [&str; 4] = ["general", "forex", "crypto", "merger"];

#[derive(Debug, Deserialize)]
struct FinnhubItem {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    url: String,
    /// Unix seconds.
    #[serde(default)]
    datetime: i64,
}

pub struct FinnhubProvider {
    mode: Mode,
}

enum Mode {
    /// Raw JSON array, one blob per category. Keeps tests offline.
    Fixture(Vec<String>),
    Http {
        api_key: String,
        client: reqwest::Client,
    },
}

impl FinnhubProvider {
    pub fn from_fixture(bodies: Vec<String>) -> Self {
        Self {
            mode: Mode::Fixture(bodies),
        }
    }

    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            mode: Mode::Http {
                api_key: api_key.into(),
                client,
            },
        }
    }

    fn parse_items(body: &str) -> Result<Vec<RawFeedItem>> {
        let items: Vec<FinnhubItem> = serde_json::from_str(body).context("parsing finnhub json")?;
        let out = items
            .into_iter()
            .filter_map(|it| {
                let published_at = DateTime::<Utc>::from_timestamp(it.datetime, 0)?;
                let body = if it.summary.is_empty() {
                    it.headline.clone()
                } else {
                    it.summary
                };
                Some(RawFeedItem {
                    title: it.headline,
                    url: it.url,
                    source: if it.source.is_empty() {
                        "Finnhub".to_string()
                    } else {
                        it.source
                    },
                    published_at,
                    body,
                    origin: OriginKind::News,
                })
            })
            .collect();
        Ok(out)
    }
}

#[async_trait]
impl FeedProvider for FinnhubProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawFeedItem>> {
        match &self.mode {
            Mode::Fixture(bodies) => {
                let mut out = Vec::new();
                for b in bodies {
                    out.append(&mut Self::parse_items(b)?);
                }
                Ok(out)
            }
            Mode::Http { api_key, client } => {
                let mut out = Vec::new();
                // One category failing must not sink the others.
                for category in CATEGORIES {
                    let url = format!(
                        "https://finnhub.io/api/v1/news?category={category}&token={api_key}"
                    );
                    let body = match client.get(&url).send().await {
                        Ok(resp) => resp.text().await.context("finnhub http .text()")?,
                        Err(e) => {
                            tracing::warn!(error = ?e, category, "finnhub category failed");
                            counter!("ingest_feed_errors_total").increment(1);
                            continue;
                        }
                    };
                    match Self::parse_items(&body) {
                        Ok(mut v) => out.append(&mut v),
                        Err(e) => {
                            tracing::warn!(error = ?e, category, "finnhub parse failed");
                            counter!("ingest_feed_errors_total").increment(1);
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    fn name(&self) -> &'static str {
        "Finnhub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixture_items() {
        let body = r#"[
            {"headline":"BHP misses earnings","summary":"BHP reported a 12% earnings miss for the half year period.","source":"Reuters","url":"https://reuters.com/bhp","datetime":1735600000},
            {"headline":"No summary item","summary":"","source":"","url":"https://reuters.com/x","datetime":1735600100}
        ]"#;
        let items = FinnhubProvider::parse_items(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source, "Reuters");
        // falls back: body <- headline, source <- "Finnhub"
        assert_eq!(items[1].body, "No summary item");
        assert_eq!(items[1].source, "Finnhub");
    }

    #[test]
    fn garbage_body_is_an_error() {
        assert!(FinnhubProvider::parse_items("<html>rate limited</html>").is_err());
    }
}
