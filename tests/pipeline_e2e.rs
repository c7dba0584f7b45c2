// tests/pipeline_e2e.rs
// Full pipeline against an in-memory store: fixture feeds in, signal rows out.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};

use finsight_signals::ingest::providers::social::{Influencer, SocialProvider};
use finsight_signals::ingest::types::{FeedProvider, OriginKind, RawFeedItem};
use finsight_signals::{MockGateway, Pipeline, RawJudgment, Store};

struct FixtureFeed {
    name: &'static str,
    items: Vec<RawFeedItem>,
}

#[async_trait]
impl FeedProvider for FixtureFeed {
    async fn fetch_latest(&self) -> Result<Vec<RawFeedItem>> {
        Ok(self.items.clone())
    }
    fn name(&self) -> &'static str {
        self.name
    }
}

fn item(title: &str, url: &str) -> RawFeedItem {
    RawFeedItem {
        title: title.to_string(),
        url: url.to_string(),
        source: "Reuters".to_string(),
        published_at: Utc::now() - Duration::minutes(10),
        body: "A long enough body describing a concrete market-moving event with numbers."
            .to_string(),
        origin: OriginKind::News,
    }
}

fn judgment(signal: &str, market: &str, ticker: &str, confidence: f64) -> RawJudgment {
    RawJudgment {
        tickers: vec![ticker.to_string()],
        market: market.to_string(),
        signal: signal.to_string(),
        confidence,
        impact: 0.4,
        pump_dump_risk: Some("LOW".to_string()),
        summary: "summary".to_string(),
        reasoning: "reasoning".to_string(),
        signal_logic: "logic".to_string(),
        relevant: true,
        skip_reason: String::new(),
    }
}

fn pipeline_with(
    feeds: Vec<Box<dyn FeedProvider>>,
    gateway: Arc<MockGateway>,
    store: Store,
) -> Pipeline {
    Pipeline::new(feeds, gateway, store, 0.68)
}

#[tokio::test]
async fn valid_judgment_becomes_a_stored_signal() {
    let store = Store::in_memory().await.unwrap();
    let gateway = Arc::new(
        MockGateway::new().with("BHP beats guidance", judgment("buy", "asx", "BHP.AX", 0.82)),
    );
    let feeds: Vec<Box<dyn FeedProvider>> = vec![Box::new(FixtureFeed {
        name: "Finnhub",
        items: vec![item("BHP beats guidance", "https://reuters.com/bhp-guidance")],
    })];

    let report = pipeline_with(feeds, gateway, store.clone())
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.stored, 1);

    let rows = store.current_signals(Utc::now(), None, None, 50).await.unwrap();
    assert_eq!(rows.len(), 1);
    // Case-insensitive inputs are normalized to the uppercase enums.
    assert_eq!(rows[0].signal, "BUY");
    assert_eq!(rows[0].market, "ASX");
    assert_eq!(rows[0].tickers_vec(), vec!["BHP.AX"]);
    assert!(rows[0].is_active);
}

#[tokio::test]
async fn out_of_range_scores_are_clamped_in_the_stored_row() {
    let store = Store::in_memory().await.unwrap();
    let mut j = judgment("SELL", "US", "TSLA", 1.4);
    j.impact = -3.0;
    let gateway = Arc::new(MockGateway::new().with("Tesla recall", j));
    let feeds: Vec<Box<dyn FeedProvider>> = vec![Box::new(FixtureFeed {
        name: "Finnhub",
        items: vec![item("Tesla recall", "https://reuters.com/tesla-recall")],
    })];

    pipeline_with(feeds, gateway, store.clone())
        .run_once()
        .await
        .unwrap();

    let rows = store.current_signals(Utc::now(), None, None, 50).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!((rows[0].confidence - 1.0).abs() < 1e-9);
    assert!((rows[0].impact + 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn irrelevant_and_invalid_judgments_persist_nothing() {
    let store = Store::in_memory().await.unwrap();
    let mut irrelevant = judgment("BUY", "US", "AAPL", 0.9);
    irrelevant.relevant = false;
    let unknown_market = judgment("BUY", "EU", "SAP", 0.9);

    let gateway = Arc::new(
        MockGateway::new()
            .with("Nothing burger", irrelevant)
            .with("SAP earnings", unknown_market),
    );
    let feeds: Vec<Box<dyn FeedProvider>> = vec![Box::new(FixtureFeed {
        name: "Finnhub",
        items: vec![
            item("Nothing burger", "https://reuters.com/nothing"),
            item("SAP earnings", "https://reuters.com/sap"),
        ],
    })];

    let report = pipeline_with(feeds, gateway, store.clone())
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.stored, 0);
    assert_eq!(report.validation_skips, 2);

    let rows = store.current_signals(Utc::now(), None, None, 50).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn gateway_failure_skips_the_article_and_continues() {
    let store = Store::in_memory().await.unwrap();
    // Only the second article has a scripted judgment; the first errors.
    let gateway = Arc::new(
        MockGateway::new().with("Gold rallies", judgment("BUY", "COMMODITY", "GOLD", 0.75)),
    );
    let feeds: Vec<Box<dyn FeedProvider>> = vec![Box::new(FixtureFeed {
        name: "Finnhub",
        items: vec![
            item("Unscripted story", "https://reuters.com/unscripted"),
            item("Gold rallies", "https://reuters.com/gold"),
        ],
    })];

    let report = pipeline_with(feeds, gateway, store.clone())
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.gateway_failures, 1);
    assert_eq!(report.stored, 1);
}

#[tokio::test]
async fn second_run_on_identical_feeds_stores_nothing_new() {
    let store = Store::in_memory().await.unwrap();
    let gateway = Arc::new(
        MockGateway::new().with("CBA dividend", judgment("BUY", "ASX", "CBA.AX", 0.8)),
    );
    let feeds = || -> Vec<Box<dyn FeedProvider>> {
        vec![Box::new(FixtureFeed {
            name: "Finnhub",
            items: vec![item("CBA dividend", "https://reuters.com/cba-dividend")],
        })]
    };

    let first = pipeline_with(feeds(), gateway.clone(), store.clone())
        .run_once()
        .await
        .unwrap();
    assert_eq!(first.stored, 1);
    let calls_after_first = gateway.calls();

    let second = pipeline_with(feeds(), gateway.clone(), store.clone())
        .run_once()
        .await
        .unwrap();
    assert_eq!(second.stored, 0);
    assert_eq!(second.already_persisted, 1);
    // The persisted-hash gate also means no second gateway round-trip.
    assert_eq!(gateway.calls(), calls_after_first);
}

#[tokio::test]
async fn same_url_from_two_feeds_yields_one_signal() {
    let store = Store::in_memory().await.unwrap();
    let gateway = Arc::new(
        MockGateway::new().with("Oil spikes", judgment("BUY", "COMMODITY", "OIL", 0.7)),
    );
    let feeds: Vec<Box<dyn FeedProvider>> = vec![
        Box::new(FixtureFeed {
            name: "Finnhub",
            items: vec![item("Oil spikes", "https://reuters.com/oil-spike")],
        }),
        Box::new(FixtureFeed {
            name: "NewsAPI",
            items: vec![item("Oil spikes", "https://reuters.com/oil-spike")],
        }),
    ];

    let report = pipeline_with(feeds, gateway, store.clone())
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.articles, 1);
    assert_eq!(report.stored, 1);
}

#[tokio::test]
async fn social_post_becomes_a_persisted_signal() {
    let store = Store::in_memory().await.unwrap();
    let text = "BHP just guided 12% above consensus. Iron ore demand is not dead yet.";
    let fixture = format!(
        r#"{{
            "data": [
                {{
                    "id": "1001",
                    "text": "{text}",
                    "created_at": "{}",
                    "public_metrics": {{"like_count": 250, "retweet_count": 40}}
                }}
            ]
        }}"#,
        Utc::now().to_rfc3339()
    );
    let feeds: Vec<Box<dyn FeedProvider>> = vec![Box::new(SocialProvider::from_fixture(
        vec![Influencer {
            handle: "miningwatch".into(),
            user_id: "123".into(),
        }],
        vec![fixture],
    ))];
    let gateway = Arc::new(MockGateway::new().with(
        format!("@miningwatch: {text}"),
        judgment("BUY", "ASX", "BHP.AX", 0.72),
    ));

    let report = pipeline_with(feeds, gateway, store.clone())
        .run_once()
        .await
        .unwrap();
    assert_eq!(report.stored, 1);

    let rows = store.current_signals(Utc::now(), None, None, 50).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source_domain, "x.com");
    assert_eq!(rows[0].source, "Twitter (@miningwatch)");
    assert!(rows[0].title.starts_with("@miningwatch:"));
}

#[tokio::test]
async fn a_snapshot_is_appended_every_run_even_with_no_articles() {
    let store = Store::in_memory().await.unwrap();
    let gateway = Arc::new(MockGateway::new());
    let feeds: Vec<Box<dyn FeedProvider>> = vec![Box::new(FixtureFeed {
        name: "Finnhub",
        items: vec![],
    })];

    pipeline_with(feeds, gateway, store.clone())
        .run_once()
        .await
        .unwrap();

    let rows = store.chart_rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].buy_count, 0);
}
