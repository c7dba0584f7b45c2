use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;

use crate::ingest::types::{FeedProvider, OriginKind, RawFeedItem};

/// Broad finance keyword query — the `everything` endpoint returns far more
/// than `top-headlines`, which is only used as a fallback.
const QUERY: &str = "stock OR market OR shares OR earnings OR acquisition OR merger OR \
                     bitcoin OR crypto OR gold OR oil OR Fed OR interest rate OR GDP OR inflation";

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiItem>,
}

#[derive(Debug, Deserialize)]
struct NewsApiItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    source: NewsApiSource,
    #[serde(rename = "publishedAt", default)]
    published_at: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NewsApiSource {
    #[serde(default)]
    name: String,
}

pub struct NewsApiProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        api_key: String,
        client: reqwest::Client,
    },
}

impl NewsApiProvider {
    pub fn from_fixture(body: impl Into<String>) -> Self {
        Self {
            mode: Mode::Fixture(body.into()),
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
        let resp: NewsApiResponse = serde_json::from_str(body).context("parsing newsapi json")?;
        let out = resp
            .articles
            .into_iter()
            .filter_map(|it| {
                let published_at = DateTime::parse_from_rfc3339(&it.published_at)
                    .ok()?
                    .with_timezone(&Utc);
                // Prefer the longest text NewsAPI gives us.
                let body = it
                    .content
                    .filter(|s| !s.is_empty())
                    .or(it.description.filter(|s| !s.is_empty()))
                    .unwrap_or_else(|| it.title.clone());
                Some(RawFeedItem {
                    title: it.title,
                    url: it.url,
                    source: if it.source.name.is_empty() {
                        "NewsAPI".to_string()
                    } else {
                        it.source.name
                    },
                    published_at,
                    body,
                    origin: OriginKind::News,
                })
            })
            .collect();
        Ok(out)
    }

    fn everything_request(client: &reqwest::Client, api_key: &str) -> reqwest::RequestBuilder {
        client.get("https://newsapi.org/v2/everything").query(&[
            ("q", QUERY),
            ("language", "en"),
            ("sortBy", "publishedAt"),
            ("pageSize", "50"),
            ("apiKey", api_key),
        ])
    }

    fn headlines_request(client: &reqwest::Client, api_key: &str) -> reqwest::RequestBuilder {
        client.get("https://newsapi.org/v2/top-headlines").query(&[
            ("category", "business"),
            ("language", "en"),
            ("pageSize", "30"),
            ("apiKey", api_key),
        ])
    }

    async fn fetch_http(api_key: &str, client: &reqwest::Client) -> Result<String> {
        match Self::everything_request(client, api_key).send().await {
            Ok(resp) if resp.status().is_success() => {
                return resp.text().await.context("newsapi everything .text()");
            }
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "newsapi everything failed");
            }
            Err(e) => {
                tracing::warn!(error = ?e, "newsapi everything failed");
            }
        }
        counter!("ingest_feed_errors_total").increment(1);

        // Fallback: business headlines.
        let resp = Self::headlines_request(client, api_key)
            .send()
            .await
            .context("newsapi top-headlines get()")?;
        resp.text().await.context("newsapi top-headlines .text()")
    }
}

#[async_trait]
impl FeedProvider for NewsApiProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawFeedItem>> {
        match &self.mode {
            Mode::Fixture(body) => Self::parse_items(body),
            Mode::Http { api_key, client } => {
                let body = Self::fetch_http(api_key, client).await?;
                Self::parse_items(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "NewsAPI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "status": "ok",
        "totalResults": 2,
        "articles": [
            {
                "source": {"id": null, "name": "AP News"},
                "title": "Gold hits record high",
                "description": "Gold prices surged past $3000 an ounce on central bank buying.",
                "url": "https://apnews.com/gold",
                "publishedAt": "2025-08-30T01:00:00Z",
                "content": "Gold prices surged past $3000 an ounce on sustained central bank buying and rate cut bets."
            },
            {
                "source": {"id": null, "name": ""},
                "title": "Broken timestamp item",
                "description": "x",
                "url": "https://example.com/x",
                "publishedAt": "not-a-date",
                "content": null
            }
        ]
    }"#;

    #[test]
    fn parses_fixture_and_skips_unparseable_timestamps() {
        let items = NewsApiProvider::parse_items(FIXTURE).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "AP News");
        assert!(items[0].body.starts_with("Gold prices surged"));
    }

    #[test]
    fn everything_request_encodes_the_keyword_query() {
        let client = reqwest::Client::new();
        let req = NewsApiProvider::everything_request(&client, "k123")
            .build()
            .unwrap();
        let url = req.url().as_str();
        assert!(url.starts_with("https://newsapi.org/v2/everything?"));
        // reqwest encodes the query pairs; no raw spaces survive.
        assert!(!url.contains(' '));
        assert!(url.contains("apiKey=k123"));
        assert!(url.contains("sortBy=publishedAt"));
    }
}
