// src/credibility.rs
//
// Source credibility scoring: a static domain -> trust-score table with
// suffix matching and a supplementary table for domains the primary map
// does not carry. Pure functions, no state, no failure modes.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Score handed to any source we cannot place.
pub const DEFAULT_CREDIBILITY: f64 = 0.60;

/// Articles below this never reach the analysis gateway.
pub const MIN_CREDIBILITY: f64 = 0.68;

static SOURCE_CREDIBILITY: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        // Tier 1 — institutional
        ("reuters.com", 0.98),
        ("bloomberg.com", 0.97),
        ("wsj.com", 0.96),
        ("ft.com", 0.95),
        ("afr.com", 0.93),
        // Tier 2 — credible financial media
        ("barrons.com", 0.92),
        ("economist.com", 0.91),
        ("cnbc.com", 0.88),
        ("marketwatch.com", 0.87),
        ("theaustralian.com.au", 0.85),
        ("abc.net.au", 0.84),
        ("morningstar.com", 0.82),
        ("skynews.com.au", 0.82),
        ("seekingalpha.com", 0.80),
        // Tier 3 — crypto / commodity specific
        ("coindesk.com", 0.79),
        ("cointelegraph.com", 0.76),
        ("kitco.com", 0.75),
        ("businessinsider.com", 0.75),
        ("fool.com.au", 0.68),
        ("fool.com", 0.68),
        // Social
        ("twitter.com", 0.70),
        ("x.com", 0.70),
    ])
});

/// Consulted only when the primary table yields the default.
static EXTRA_DOMAINS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("investing.com", 0.78),
        ("finance.yahoo.com", 0.75),
        ("apnews.com", 0.90),
        ("bbc.com", 0.88),
        ("theguardian.com", 0.85),
        ("nytimes.com", 0.88),
        ("forbes.com", 0.78),
        ("benzinga.com", 0.72),
        ("zacks.com", 0.72),
        ("nasdaq.com", 0.80),
        ("thestreet.com", 0.74),
        ("proactiveinvestors.com", 0.70),
    ])
});

/// Lowercased host with any leading `www.` stripped. Malformed input yields
/// an empty string, which no table key matches.
pub fn domain_from_url(url: &str) -> String {
    let rest = url
        .trim()
        .strip_prefix("https://")
        .or_else(|| url.trim().strip_prefix("http://"))
        .unwrap_or_else(|| url.trim());
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .split('@')
        .last()
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("");
    let host = host.to_ascii_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

/// Exact match first, then suffix match. When several keys suffix-match the
/// host the longest one wins, so lookups are deterministic regardless of map
/// iteration order.
fn lookup(table: &HashMap<&'static str, f64>, host: &str) -> Option<f64> {
    if let Some(score) = table.get(host) {
        return Some(*score);
    }
    table
        .iter()
        .filter(|(key, _)| host.ends_with(*key))
        .max_by_key(|(key, _)| key.len())
        .map(|(_, score)| *score)
}

/// Trust score for the article's source, in [0, 1].
pub fn score(url: &str) -> f64 {
    let host = domain_from_url(url);
    if host.is_empty() {
        return DEFAULT_CREDIBILITY;
    }
    if let Some(s) = lookup(&SOURCE_CREDIBILITY, &host) {
        return s;
    }
    lookup(&EXTRA_DOMAINS, &host).unwrap_or(DEFAULT_CREDIBILITY)
}
