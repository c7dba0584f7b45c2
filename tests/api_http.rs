// tests/api_http.rs
//
// HTTP-level tests for the read-only Router without opening sockets,
// exercised directly via tower::ServiceExt::oneshot.

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use finsight_signals::analyze::judgment::{Market, PumpRisk, SignalKind, ValidatedJudgment};
use finsight_signals::api::{create_router, AppState};
use finsight_signals::store::{NewSignal, SignalCounts, Store};

const BODY_LIMIT: usize = 1024 * 1024;

async fn seeded_router() -> (Router, Store) {
    let store = Store::in_memory().await.unwrap();
    let now = Utc::now();
    for (hash, kind, ticker, conf) in [
        ("h1", SignalKind::Buy, "BHP.AX", 0.8),
        ("h2", SignalKind::Sell, "CBA.AX", 0.6),
    ] {
        let sig = NewSignal {
            news_hash: hash.to_string(),
            title: format!("title {hash}"),
            source: "Reuters".into(),
            source_domain: "reuters.com".into(),
            credibility: 0.98,
            published_at: now,
            judgment: ValidatedJudgment {
                kind,
                market: Market::Asx,
                tickers: vec![ticker.to_string()],
                confidence: conf,
                impact: 0.2,
                pump_dump_risk: PumpRisk::Low,
                summary: "s".into(),
                reasoning: "r".into(),
                signal_logic: "l".into(),
            },
        };
        store.insert_resolved(&sig, now, None).await.unwrap();
    }
    (create_router(AppState { store: store.clone() }), store)
}

async fn get_json(app: Router, uri: &str) -> Json {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK, "GET {uri} should be 200");
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _store) = seeded_router().await;
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn signals_returns_active_rows_with_parsed_tickers() {
    let (app, _store) = seeded_router().await;
    let v = get_json(app, "/signals").await;
    let arr = v.as_array().expect("array");
    assert_eq!(arr.len(), 2);
    // Tickers come back as a real JSON list, not the stored string.
    assert!(arr[0]["tickers"].is_array());
    assert!(arr[0]["signal"].is_string());
}

#[tokio::test]
async fn signals_filters_are_case_insensitive() {
    let (app, _store) = seeded_router().await;
    let v = get_json(app, "/signals?signal=buy&market=asx").await;
    let arr = v.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["signal"], "BUY");
}

#[tokio::test]
async fn stats_counts_active_signals() {
    let (app, _store) = seeded_router().await;
    let v = get_json(app, "/signals/stats").await;
    assert_eq!(v["total"], 2);
    assert_eq!(v["buy"], 1);
    assert_eq!(v["sell"], 1);
    assert!((v["avg_confidence"].as_f64().unwrap() - 0.70).abs() < 1e-9);
}

#[tokio::test]
async fn chart_data_placeholder_then_snapshots() {
    let (app, store) = seeded_router().await;
    let v = get_json(app.clone(), "/chart-data").await;
    assert_eq!(v.as_array().unwrap().len(), 1);
    assert_eq!(v[0]["time"], "Now");

    store
        .record_snapshot(
            "9AM",
            SignalCounts {
                buy: 1,
                sell: 1,
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();
    let v = get_json(app, "/chart-data").await;
    assert_eq!(v[0]["time"], "9AM");
    assert_eq!(v[0]["buy"], 1);
}
