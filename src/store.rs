//! Persistence for signals and chart snapshots (SQLite via sqlx).
//!
//! The store owns two tables. `signals` is the system of record: one row per
//! source article, deactivated (never deleted) when superseded by conflict
//! resolution. `chart_snapshots` is an append-only hourly roll-up of active
//! signal counts.
//!
//! `insert_resolved` commits the conflict resolver's outcome in a single
//! transaction: a reader never observes the old and the new signal active at
//! the same time.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::analyze::judgment::{SignalKind, ValidatedJudgment};
use crate::ingest::types::Article;

/// How far back a stored signal stays "current" for readers and eligible for
/// conflict checks.
pub const ACTIVE_WINDOW_HOURS: i64 = 24;

/// Persisted signal row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SignalRow {
    pub id: i64,
    pub news_hash: String,
    pub title: String,
    pub source: String,
    pub source_domain: String,
    pub credibility: f64,
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub signal: String,
    pub confidence: f64,
    pub impact: f64,
    /// JSON-encoded ordered list.
    pub tickers: String,
    pub market: String,
    pub summary: String,
    pub reasoning: String,
    pub signal_logic: String,
    pub pump_dump_risk: String,
    pub is_active: bool,
}

impl SignalRow {
    pub fn tickers_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.tickers).unwrap_or_default()
    }

    pub fn kind(&self) -> Option<SignalKind> {
        SignalKind::parse(&self.signal)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChartSnapshotRow {
    pub id: i64,
    pub hour_label: String,
    pub buy_count: i64,
    pub sell_count: i64,
    pub avoid_count: i64,
    pub watch_count: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Live counts of active signals per kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalCounts {
    pub buy: i64,
    pub sell: i64,
    pub avoid: i64,
    pub watch: i64,
}

/// Fields the pipeline supplies for a brand-new signal row.
#[derive(Debug, Clone)]
pub struct NewSignal {
    pub news_hash: String,
    pub title: String,
    pub source: String,
    pub source_domain: String,
    pub credibility: f64,
    pub published_at: DateTime<Utc>,
    pub judgment: ValidatedJudgment,
}

impl NewSignal {
    pub fn from_article(article: &Article, judgment: ValidatedJudgment) -> Self {
        Self {
            news_hash: article.news_hash.clone(),
            title: article.title.clone(),
            source: article.source.clone(),
            source_domain: article.source_domain.clone(),
            credibility: article.credibility,
            published_at: article.published_at,
            judgment,
        }
    }
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to `url` (e.g. `sqlite://finsight.db`) and bootstrap the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("parsing database url '{url}'"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .context("connecting to store")?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Fresh in-memory store for tests. Single connection so the database
    /// lives as long as the pool.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                news_hash      TEXT NOT NULL UNIQUE,
                title          TEXT NOT NULL,
                source         TEXT NOT NULL,
                source_domain  TEXT NOT NULL,
                credibility    REAL NOT NULL,
                published_at   TEXT NOT NULL,
                ingested_at    TEXT NOT NULL,
                signal         TEXT NOT NULL,
                confidence     REAL NOT NULL,
                impact         REAL NOT NULL,
                tickers        TEXT NOT NULL,
                market         TEXT NOT NULL,
                summary        TEXT NOT NULL,
                reasoning      TEXT NOT NULL,
                signal_logic   TEXT NOT NULL DEFAULT '',
                pump_dump_risk TEXT NOT NULL DEFAULT 'LOW',
                is_active      INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_signals_active ON signals (is_active, ingested_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chart_snapshots (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                hour_label   TEXT NOT NULL,
                buy_count    INTEGER NOT NULL DEFAULT 0,
                sell_count   INTEGER NOT NULL DEFAULT 0,
                avoid_count  INTEGER NOT NULL DEFAULT 0,
                watch_count  INTEGER NOT NULL DEFAULT 0,
                recorded_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Cross-run dedup gate: has this article ever produced a signal?
    pub async fn contains_hash(&self, news_hash: &str) -> Result<bool> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM signals WHERE news_hash = ?")
            .bind(news_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    /// Active signals ingested within the conflict window, most recent first.
    pub async fn active_in_window(&self, now: DateTime<Utc>) -> Result<Vec<SignalRow>> {
        let cutoff = now - Duration::hours(ACTIVE_WINDOW_HOURS);
        sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT * FROM signals
            WHERE is_active = 1 AND ingested_at >= ?
            ORDER BY ingested_at DESC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Persist one resolved signal, deactivating the superseded row (if any)
    /// in the same transaction.
    pub async fn insert_resolved(
        &self,
        new: &NewSignal,
        ingested_at: DateTime<Utc>,
        deactivate_id: Option<i64>,
    ) -> Result<i64> {
        let tickers =
            serde_json::to_string(&new.judgment.tickers).context("encoding tickers")?;

        let mut tx = self.pool.begin().await?;

        if let Some(id) = deactivate_id {
            sqlx::query("UPDATE signals SET is_active = 0 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO signals (
                news_hash, title, source, source_domain, credibility,
                published_at, ingested_at, signal, confidence, impact,
                tickers, market, summary, reasoning, signal_logic,
                pump_dump_risk, is_active
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
            RETURNING id
            "#,
        )
        .bind(&new.news_hash)
        .bind(&new.title)
        .bind(&new.source)
        .bind(&new.source_domain)
        .bind(new.credibility)
        .bind(new.published_at)
        .bind(ingested_at)
        .bind(new.judgment.kind.as_str())
        .bind(new.judgment.confidence)
        .bind(new.judgment.impact)
        .bind(&tickers)
        .bind(new.judgment.market.as_str())
        .bind(&new.judgment.summary)
        .bind(&new.judgment.reasoning)
        .bind(&new.judgment.signal_logic)
        .bind(new.judgment.pump_dump_risk.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Counts of currently-active signals per kind (no window — mirrors what
    /// the chart snapshot records).
    pub async fn active_counts(&self) -> Result<SignalCounts> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT signal, COUNT(*) FROM signals WHERE is_active = 1 GROUP BY signal",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = SignalCounts::default();
        for (signal, n) in rows {
            match signal.as_str() {
                "BUY" => counts.buy = n,
                "SELL" => counts.sell = n,
                "AVOID" => counts.avoid = n,
                "WATCH" => counts.watch = n,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// Append one chart snapshot row.
    pub async fn record_snapshot(
        &self,
        hour_label: &str,
        counts: SignalCounts,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chart_snapshots
                (hour_label, buy_count, sell_count, avoid_count, watch_count, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(hour_label)
        .bind(counts.buy)
        .bind(counts.sell)
        .bind(counts.avoid)
        .bind(counts.watch)
        .bind(recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Read contract: active signals ingested within the last 24 h, newest
    /// first, optionally filtered by market and/or kind.
    pub async fn current_signals(
        &self,
        now: DateTime<Utc>,
        market: Option<&str>,
        signal: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SignalRow>> {
        let cutoff = now - Duration::hours(ACTIVE_WINDOW_HOURS);
        sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT * FROM signals
            WHERE is_active = 1
              AND ingested_at >= ?
              AND (? IS NULL OR market = ?)
              AND (? IS NULL OR signal = ?)
            ORDER BY ingested_at DESC
            LIMIT ?
            "#,
        )
        .bind(cutoff)
        .bind(market)
        .bind(market)
        .bind(signal)
        .bind(signal)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Read contract: the most recent 24 snapshots, oldest first.
    pub async fn chart_rows(&self) -> Result<Vec<ChartSnapshotRow>> {
        sqlx::query_as::<_, ChartSnapshotRow>(
            r#"
            SELECT * FROM (
                SELECT * FROM chart_snapshots ORDER BY recorded_at DESC LIMIT 24
            ) ORDER BY recorded_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Fetch one row by id (test and diagnostics helper).
    pub async fn signal_by_id(&self, id: i64) -> Result<Option<SignalRow>> {
        sqlx::query_as::<_, SignalRow>("SELECT * FROM signals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }
}
