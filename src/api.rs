//! Read-only HTTP surface for the frontend: current signals, stats, chart
//! data. All writes happen inside the pipeline; these handlers only query.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;

use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/signals", get(get_signals))
        .route("/signals/stats", get(get_signal_stats))
        .route("/chart-data", get(get_chart_data))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct SignalsQuery {
    /// Filter: ASX | US | CRYPTO | COMMODITY
    market: Option<String>,
    /// Filter: BUY | SELL | AVOID | WATCH
    signal: Option<String>,
    limit: Option<i64>,
}

#[derive(serde::Serialize)]
struct SignalOut {
    id: i64,
    title: String,
    source: String,
    source_domain: String,
    credibility: f64,
    published_at: DateTime<Utc>,
    ingested_at: DateTime<Utc>,
    signal: String,
    confidence: f64,
    impact: f64,
    tickers: Vec<String>,
    market: String,
    summary: String,
    reasoning: String,
    signal_logic: String,
    pump_dump_risk: String,
}

async fn get_signals(
    State(state): State<AppState>,
    Query(q): Query<SignalsQuery>,
) -> Json<Vec<SignalOut>> {
    let market = q.market.as_deref().map(str::to_ascii_uppercase);
    let signal = q.signal.as_deref().map(str::to_ascii_uppercase);
    let limit = q.limit.unwrap_or(50).clamp(1, 200);

    let rows = state
        .store
        .current_signals(Utc::now(), market.as_deref(), signal.as_deref(), limit)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = ?e, "signals query failed");
            Vec::new()
        });

    let out = rows
        .into_iter()
        .map(|s| SignalOut {
            tickers: s.tickers_vec(),
            id: s.id,
            title: s.title,
            source: s.source,
            source_domain: s.source_domain,
            credibility: s.credibility,
            published_at: s.published_at,
            ingested_at: s.ingested_at,
            signal: s.signal,
            confidence: s.confidence,
            impact: s.impact,
            market: s.market,
            summary: s.summary,
            reasoning: s.reasoning,
            signal_logic: s.signal_logic,
            pump_dump_risk: s.pump_dump_risk,
        })
        .collect();
    Json(out)
}

#[derive(serde::Serialize)]
struct StatsOut {
    total: usize,
    buy: usize,
    sell: usize,
    avoid: usize,
    watch: usize,
    avg_confidence: f64,
}

async fn get_signal_stats(State(state): State<AppState>) -> Json<StatsOut> {
    let rows = state
        .store
        .current_signals(Utc::now(), None, None, i64::MAX)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = ?e, "stats query failed");
            Vec::new()
        });

    let mut out = StatsOut {
        total: rows.len(),
        buy: 0,
        sell: 0,
        avoid: 0,
        watch: 0,
        avg_confidence: 0.0,
    };
    let mut conf_sum = 0.0;
    for r in &rows {
        match r.signal.as_str() {
            "BUY" => out.buy += 1,
            "SELL" => out.sell += 1,
            "AVOID" => out.avoid += 1,
            "WATCH" => out.watch += 1,
            _ => {}
        }
        conf_sum += r.confidence;
    }
    if !rows.is_empty() {
        out.avg_confidence = (conf_sum / rows.len() as f64 * 100.0).round() / 100.0;
    }
    Json(out)
}

#[derive(serde::Serialize)]
struct ChartPointOut {
    time: String,
    buy: i64,
    sell: i64,
    avoid: i64,
    watch: i64,
}

async fn get_chart_data(State(state): State<AppState>) -> Json<Vec<ChartPointOut>> {
    let rows = state.store.chart_rows().await.unwrap_or_else(|e| {
        tracing::error!(error = ?e, "chart query failed");
        Vec::new()
    });

    if rows.is_empty() {
        // Placeholder so an empty chart renders instead of crashing.
        return Json(vec![ChartPointOut {
            time: "Now".to_string(),
            buy: 0,
            sell: 0,
            avoid: 0,
            watch: 0,
        }]);
    }

    let out = rows
        .into_iter()
        .map(|s| ChartPointOut {
            time: s.hour_label,
            buy: s.buy_count,
            sell: s.sell_count,
            avoid: s.avoid_count,
            watch: s.watch_count,
        })
        .collect();
    Json(out)
}
