// src/ingest/mod.rs
pub mod providers;
pub mod types;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::credibility;
use crate::ingest::types::{Article, FeedProvider, RawFeedItem};

/// Items older than this (relative to fetch time) carry no actionable signal.
pub const RECENCY_WINDOW_HOURS: i64 = 6;

/// Bodies shorter than this give the analysis gateway nothing to work with.
pub const MIN_BODY_CHARS: usize = 30;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Raw items received from feeds.");
        describe_counter!(
            "ingest_kept_total",
            "Articles kept after normalization + filtering."
        );
        describe_counter!(
            "ingest_stale_total",
            "Items dropped for falling outside the recency window."
        );
        describe_counter!(
            "ingest_thin_total",
            "Items dropped for having too little body text."
        );
        describe_counter!(
            "ingest_low_credibility_total",
            "Items dropped below the minimum credibility threshold."
        );
        describe_counter!("ingest_dedup_total", "Items removed as in-run duplicates.");
        describe_counter!("ingest_feed_errors_total", "Feed fetch/parse errors.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when the ingest stage last ran."
        );
    });
}

/// Normalize text: decode HTML entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize typographic quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Stable 80-bit content hash: sha256 of the canonical URL (title when the
/// URL is absent), truncated to 20 hex chars. Short enough to store cheaply,
/// long enough that collisions are a non-issue at this volume.
pub fn content_hash(url: &str, title: &str) -> String {
    let key = if url.trim().is_empty() { title } else { url };
    let digest = Sha256::digest(key.as_bytes());
    let mut out = String::with_capacity(20);
    for b in digest.iter().take(10) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Per-run drop counts, for telemetry and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub received: usize,
    pub stale: usize,
    pub thin: usize,
    pub low_credibility: usize,
    pub deduped: usize,
}

/// Normalize, filter and deduplicate raw feed items into canonical articles.
///
/// Order is preserved: provider order, each provider's natural order. Dedup
/// keeps the first occurrence of a hash regardless of which feed it came
/// from — a later, higher-credibility mirror of the same story is dropped.
/// That asymmetry is accepted policy, not a defect.
pub fn normalize_filter_dedup(
    now: DateTime<Utc>,
    raw_items: Vec<RawFeedItem>,
    min_credibility: f64,
) -> (Vec<Article>, IngestStats) {
    let cutoff = now - Duration::hours(RECENCY_WINDOW_HOURS);
    let mut stats = IngestStats {
        received: raw_items.len(),
        ..Default::default()
    };

    let mut seen_hashes: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(raw_items.len());

    for item in raw_items {
        if item.published_at < cutoff {
            stats.stale += 1;
            continue;
        }

        let body = normalize_text(&item.body);
        if body.chars().count() < MIN_BODY_CHARS {
            stats.thin += 1;
            continue;
        }

        let cred = credibility::score(&item.url);
        if cred < min_credibility {
            stats.low_credibility += 1;
            continue;
        }

        let hash = content_hash(&item.url, &item.title);
        if !seen_hashes.insert(hash.clone()) {
            stats.deduped += 1;
            continue;
        }

        kept.push(Article {
            news_hash: hash,
            title: normalize_text(&item.title),
            source_domain: credibility::domain_from_url(&item.url),
            source: item.source,
            url: item.url,
            published_at: item.published_at,
            body,
            credibility: cred,
            origin: item.origin,
        });
    }

    (kept, stats)
}

/// Fetch every feed once and produce the run's article set. A failing feed
/// is logged and simply contributes nothing; it never aborts the run.
pub async fn run_once(
    providers: &[Box<dyn FeedProvider>],
    min_credibility: f64,
) -> (Vec<Article>, IngestStats) {
    ensure_metrics_described();

    let mut raw = Vec::new();
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => raw.append(&mut v),
            Err(e) => {
                tracing::warn!(error = ?e, provider = p.name(), "feed error");
                counter!("ingest_feed_errors_total").increment(1);
            }
        }
    }

    let now = Utc::now();
    let (kept, stats) = normalize_filter_dedup(now, raw, min_credibility);

    counter!("ingest_items_total").increment(stats.received as u64);
    counter!("ingest_kept_total").increment(kept.len() as u64);
    counter!("ingest_stale_total").increment(stats.stale as u64);
    counter!("ingest_thin_total").increment(stats.thin as u64);
    counter!("ingest_low_credibility_total").increment(stats.low_credibility as u64);
    counter!("ingest_dedup_total").increment(stats.deduped as u64);
    gauge!("ingest_last_run_ts").set(now.timestamp() as f64);

    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::OriginKind;

    fn item(title: &str, url: &str, age_mins: i64, body: &str) -> RawFeedItem {
        RawFeedItem {
            title: title.to_string(),
            url: url.to_string(),
            source: "Reuters".to_string(),
            published_at: Utc::now() - Duration::minutes(age_mins),
            body: body.to_string(),
            origin: OriginKind::News,
        }
    }

    const BODY: &str = "BHP posted a twelve percent earnings miss for the half year.";

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "  <b>Hello&nbsp;&nbsp;world</b> &ldquo;ok&rdquo;  ";
        assert_eq!(normalize_text(s), r#"Hello world "ok""#);
    }

    #[test]
    fn content_hash_is_20_hex_chars_and_url_keyed() {
        let a = content_hash("https://reuters.com/a", "Title A");
        let b = content_hash("https://reuters.com/a", "Totally different title");
        let c = content_hash("https://reuters.com/b", "Title A");
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, b); // URL wins over title
        assert_ne!(a, c);
    }

    #[test]
    fn content_hash_falls_back_to_title() {
        let a = content_hash("", "Gold spikes on rate cut bets");
        let b = content_hash("  ", "Gold spikes on rate cut bets");
        assert_eq!(a, b);
    }

    #[test]
    fn stale_and_thin_items_are_dropped() {
        let items = vec![
            item("old", "https://reuters.com/old", 60 * 7, BODY),
            item("thin", "https://reuters.com/thin", 5, "too short"),
            item("ok", "https://reuters.com/ok", 5, BODY),
        ];
        let (kept, stats) = normalize_filter_dedup(Utc::now(), items, 0.68);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "ok");
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.thin, 1);
    }

    #[test]
    fn low_credibility_items_are_dropped() {
        let items = vec![
            item("blog", "https://random-pump-blog.io/x", 5, BODY),
            item("wire", "https://reuters.com/x", 5, BODY),
        ];
        let (kept, stats) = normalize_filter_dedup(Utc::now(), items, 0.68);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.low_credibility, 1);
    }

    #[test]
    fn first_occurrence_wins_across_feeds() {
        // Same URL from two feeds: the first (lower-credibility source name
        // makes no difference — hash is URL-keyed) is kept.
        let mut first = item("story", "https://apnews.com/story", 10, BODY);
        first.source = "NewsAPI".to_string();
        let mut second = item("story", "https://apnews.com/story", 5, BODY);
        second.source = "Finnhub".to_string();

        let (kept, stats) = normalize_filter_dedup(Utc::now(), vec![first, second], 0.68);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source, "NewsAPI");
        assert_eq!(stats.deduped, 1);
    }

    #[test]
    fn discovery_order_is_preserved() {
        let items = vec![
            item("a", "https://reuters.com/a", 5, BODY),
            item("b", "https://reuters.com/b", 4, BODY),
            item("c", "https://reuters.com/c", 3, BODY),
        ];
        let (kept, _) = normalize_filter_dedup(Utc::now(), items, 0.68);
        let titles: Vec<_> = kept.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }
}
