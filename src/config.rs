//! Environment-driven settings. `.env` is loaded by the binary in dev;
//! everything has a workable default except the external API keys, whose
//! absence simply disables the corresponding collaborator.

use std::time::Duration;

use crate::credibility::MIN_CREDIBILITY;

#[derive(Debug, Clone)]
pub struct Settings {
    pub groq_api_key: String,
    pub finnhub_api_key: String,
    pub news_api_key: String,
    pub twitter_bearer_token: String,
    /// Curated X handles, `handle:user_id` comma-separated.
    pub influencers: String,
    pub database_url: String,
    pub bind_addr: String,
    pub pipeline_interval: Duration,
    pub price_interval: Duration,
    pub min_credibility: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            groq_api_key: String::new(),
            finnhub_api_key: String::new(),
            news_api_key: String::new(),
            twitter_bearer_token: String::new(),
            influencers: String::new(),
            database_url: "sqlite://finsight.db".to_string(),
            bind_addr: "0.0.0.0:8000".to_string(),
            pipeline_interval: Duration::from_secs(5 * 60),
            price_interval: Duration::from_secs(60),
            min_credibility: MIN_CREDIBILITY,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            groq_api_key: env_or("GROQ_API_KEY", &d.groq_api_key),
            finnhub_api_key: env_or("FINNHUB_API_KEY", &d.finnhub_api_key),
            news_api_key: env_or("NEWS_API_KEY", &d.news_api_key),
            twitter_bearer_token: env_or("TWITTER_BEARER_TOKEN", &d.twitter_bearer_token),
            influencers: env_or("X_INFLUENCERS", &d.influencers),
            database_url: env_or("DATABASE_URL", &d.database_url),
            bind_addr: env_or("BIND_ADDR", &d.bind_addr),
            pipeline_interval: env_secs("PIPELINE_INTERVAL_SECS", d.pipeline_interval),
            price_interval: env_secs("PRICE_INTERVAL_SECS", d.price_interval),
            min_credibility: std::env::var("MIN_CREDIBILITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.min_credibility),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
