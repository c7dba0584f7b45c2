//! Curated-influencer X/Twitter feed. Only high-engagement posts from a
//! vetted handle list enter the pipeline, clearly labelled with the handle
//! so a social-origin signal is never mistaken for editorial news.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;

use crate::ingest::types::{FeedProvider, OriginKind, RawFeedItem};

/// Combined likes + reposts below this is noise, not signal.
const MIN_ENGAGEMENT: u64 = 100;

/// Posts fetched per influencer per tick.
const POSTS_PER_HANDLE: usize = 5;

const TITLE_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Influencer {
    pub handle: String,
    pub user_id: String,
}

/// Parse `handle:user_id,handle:user_id` (the `X_INFLUENCERS` env format).
/// Malformed entries are skipped.
pub fn parse_influencers(spec: &str) -> Vec<Influencer> {
    spec.split(',')
        .filter_map(|entry| {
            let (handle, user_id) = entry.trim().split_once(':')?;
            if handle.is_empty() || user_id.is_empty() {
                return None;
            }
            Some(Influencer {
                handle: handle.trim_start_matches('@').to_string(),
                user_id: user_id.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct TweetsResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    #[serde(default)]
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    public_metrics: TweetMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct TweetMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
}

pub struct SocialProvider {
    mode: Mode,
    influencers: Vec<Influencer>,
}

enum Mode {
    /// One raw JSON body per influencer, paired by position.
    Fixture(Vec<String>),
    Http {
        bearer_token: String,
        client: reqwest::Client,
    },
}

impl SocialProvider {
    pub fn from_fixture(influencers: Vec<Influencer>, bodies: Vec<String>) -> Self {
        Self {
            mode: Mode::Fixture(bodies),
            influencers,
        }
    }

    pub fn from_bearer_token(bearer_token: impl Into<String>, influencers: Vec<Influencer>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            mode: Mode::Http {
                bearer_token: bearer_token.into(),
                client,
            },
            influencers,
        }
    }

    fn parse_items(handle: &str, body: &str) -> Result<Vec<RawFeedItem>> {
        let resp: TweetsResponse = serde_json::from_str(body).context("parsing tweets json")?;

        let out = resp
            .data
            .into_iter()
            .filter_map(|t| {
                let engagement = t.public_metrics.like_count + t.public_metrics.retweet_count;
                if engagement < MIN_ENGAGEMENT {
                    return None;
                }
                let published_at = DateTime::parse_from_rfc3339(&t.created_at)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                let excerpt: String = t.text.chars().take(TITLE_CHARS).collect();
                Some(RawFeedItem {
                    title: format!("@{handle}: {excerpt}"),
                    url: format!("https://x.com/{handle}/status/{}", t.id),
                    source: format!("Twitter (@{handle})"),
                    published_at,
                    body: t.text,
                    origin: OriginKind::Social,
                })
            })
            .collect();
        Ok(out)
    }

    fn timeline_request(
        client: &reqwest::Client,
        bearer_token: &str,
        user_id: &str,
    ) -> reqwest::RequestBuilder {
        client
            .get(format!("https://api.x.com/2/users/{user_id}/tweets"))
            .bearer_auth(bearer_token)
            .query(&[
                ("max_results", POSTS_PER_HANDLE.to_string().as_str()),
                ("tweet.fields", "created_at,public_metrics"),
                ("exclude", "retweets,replies"),
            ])
    }
}

#[async_trait]
impl FeedProvider for SocialProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawFeedItem>> {
        match &self.mode {
            Mode::Fixture(bodies) => {
                let mut out = Vec::new();
                for (influencer, body) in self.influencers.iter().zip(bodies) {
                    out.append(&mut Self::parse_items(&influencer.handle, body)?);
                }
                Ok(out)
            }
            Mode::Http {
                bearer_token,
                client,
            } => {
                let mut out = Vec::new();
                // One handle failing must not sink the others.
                for influencer in &self.influencers {
                    let req = Self::timeline_request(client, bearer_token, &influencer.user_id);
                    let body = match req.send().await {
                        Ok(resp) if resp.status().is_success() => {
                            resp.text().await.context("x timeline .text()")?
                        }
                        Ok(resp) => {
                            tracing::warn!(status = %resp.status(), handle = %influencer.handle, "x timeline failed");
                            counter!("ingest_feed_errors_total").increment(1);
                            continue;
                        }
                        Err(e) => {
                            tracing::warn!(error = ?e, handle = %influencer.handle, "x timeline failed");
                            counter!("ingest_feed_errors_total").increment(1);
                            continue;
                        }
                    };
                    match Self::parse_items(&influencer.handle, &body) {
                        Ok(mut v) => out.append(&mut v),
                        Err(e) => {
                            tracing::warn!(error = ?e, handle = %influencer.handle, "x timeline parse failed");
                            counter!("ingest_feed_errors_total").increment(1);
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    fn name(&self) -> &'static str {
        "X"
    }
}
