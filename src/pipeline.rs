//! Per-run pipeline orchestration:
//! ingest → dedup → analyze → validate → resolve → persist → snapshot.
//!
//! One sequential unit of work per tick. Articles are processed one at a
//! time against a consistently-updated store — the conflict invariant
//! depends on that ordering, so there is no intra-run fan-out. Per-article
//! failures are explicit outcomes, never control-flow errors; only store
//! read failures (connection loss) abort the run.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use metrics::{counter, describe_counter, gauge};
use once_cell::sync::OnceCell;

use crate::analyze::gateway::DynGateway;
use crate::analyze::judgment::{self, Validation};
use crate::conflict::{self, Resolution};
use crate::ingest::{self, types::FeedProvider};
use crate::store::{NewSignal, Store};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Completed pipeline runs.");
        describe_counter!("pipeline_signals_stored_total", "New signal rows written.");
        describe_counter!(
            "pipeline_already_persisted_total",
            "Articles skipped because their hash was already stored."
        );
        describe_counter!("pipeline_gateway_failures_total", "Gateway call failures.");
        describe_counter!(
            "pipeline_validation_skips_total",
            "Judgments dropped by the output contract."
        );
        describe_counter!(
            "pipeline_conflicts_suppressed_total",
            "New judgments discarded in favor of a stronger existing signal."
        );
        describe_counter!(
            "pipeline_conflicts_resolved_total",
            "Existing signals deactivated by override or merge."
        );
        describe_counter!(
            "pipeline_persist_failures_total",
            "Signal writes that failed and were skipped."
        );
    });
}

/// What happened to one article. Diagnostic; the run always continues.
#[derive(Debug)]
pub enum ArticleOutcome {
    Stored { id: i64, resolved_conflict: bool },
    AlreadyPersisted,
    GatewayFailed,
    ValidationSkipped,
    ConflictSuppressed,
    PersistFailed,
}

/// Tallies for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub articles: usize,
    pub stored: usize,
    pub already_persisted: usize,
    pub gateway_failures: usize,
    pub validation_skips: usize,
    pub conflicts_suppressed: usize,
    pub conflicts_resolved: usize,
    pub persist_failures: usize,
}

pub struct Pipeline {
    providers: Vec<Box<dyn FeedProvider>>,
    gateway: DynGateway,
    store: Store,
    min_credibility: f64,
}

impl Pipeline {
    pub fn new(
        providers: Vec<Box<dyn FeedProvider>>,
        gateway: DynGateway,
        store: Store,
        min_credibility: f64,
    ) -> Self {
        Self {
            providers,
            gateway,
            store,
            min_credibility,
        }
    }

    /// One full run. Returns the tally; errors only on store read failure.
    pub async fn run_once(&self) -> Result<RunReport> {
        ensure_metrics_described();

        let (articles, ingest_stats) =
            ingest::run_once(&self.providers, self.min_credibility).await;
        tracing::info!(
            kept = articles.len(),
            received = ingest_stats.received,
            deduped = ingest_stats.deduped,
            "ingest complete"
        );

        let mut report = RunReport {
            articles: articles.len(),
            ..Default::default()
        };

        for article in &articles {
            let outcome = self.process_article(article).await?;
            match outcome {
                ArticleOutcome::Stored {
                    id,
                    resolved_conflict,
                } => {
                    report.stored += 1;
                    if resolved_conflict {
                        report.conflicts_resolved += 1;
                    }
                    tracing::info!(id, title = %truncate(&article.title, 70), "signal stored");
                }
                ArticleOutcome::AlreadyPersisted => report.already_persisted += 1,
                ArticleOutcome::GatewayFailed => report.gateway_failures += 1,
                ArticleOutcome::ValidationSkipped => report.validation_skips += 1,
                ArticleOutcome::ConflictSuppressed => report.conflicts_suppressed += 1,
                ArticleOutcome::PersistFailed => report.persist_failures += 1,
            }
        }

        // Snapshot runs after the loop, success or partial failure alike,
        // and never aborts the run.
        if let Err(e) = self.record_snapshot().await {
            tracing::warn!(error = ?e, "chart snapshot failed");
        }

        counter!("pipeline_runs_total").increment(1);
        counter!("pipeline_signals_stored_total").increment(report.stored as u64);
        counter!("pipeline_already_persisted_total").increment(report.already_persisted as u64);
        counter!("pipeline_gateway_failures_total").increment(report.gateway_failures as u64);
        counter!("pipeline_validation_skips_total").increment(report.validation_skips as u64);
        counter!("pipeline_conflicts_suppressed_total")
            .increment(report.conflicts_suppressed as u64);
        counter!("pipeline_conflicts_resolved_total").increment(report.conflicts_resolved as u64);
        counter!("pipeline_persist_failures_total").increment(report.persist_failures as u64);
        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);

        tracing::info!(
            articles = report.articles,
            stored = report.stored,
            "pipeline complete"
        );
        Ok(report)
    }

    async fn process_article(
        &self,
        article: &crate::ingest::types::Article,
    ) -> Result<ArticleOutcome> {
        // Cross-run dedup: once persisted, never reprocessed.
        if self
            .store
            .contains_hash(&article.news_hash)
            .await
            .context("store hash lookup")?
        {
            return Ok(ArticleOutcome::AlreadyPersisted);
        }

        let raw = match self.gateway.analyze(article).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = ?e, title = %truncate(&article.title, 70), "gateway failed, article skipped");
                return Ok(ArticleOutcome::GatewayFailed);
            }
        };

        let validated = match judgment::validate(&raw) {
            Validation::Valid(j) => *j,
            Validation::Skip(reason) => {
                tracing::debug!(%reason, title = %truncate(&article.title, 70), "judgment skipped");
                return Ok(ArticleOutcome::ValidationSkipped);
            }
        };

        let now = Utc::now();
        let active = self
            .store
            .active_in_window(now)
            .await
            .context("store window scan")?;

        let (judgment, deactivate) = match conflict::resolve(validated, &active) {
            Resolution::Store {
                judgment,
                deactivate,
            } => (judgment, deactivate),
            Resolution::Discard { .. } => {
                return Ok(ArticleOutcome::ConflictSuppressed);
            }
        };

        let resolved_conflict = deactivate.is_some();
        let new_signal = NewSignal::from_article(article, judgment);
        match self.store.insert_resolved(&new_signal, now, deactivate).await {
            Ok(id) => Ok(ArticleOutcome::Stored {
                id,
                resolved_conflict,
            }),
            Err(e) => {
                // Per-article write failure: roll forward to the next
                // article, the transaction already rolled this one back.
                tracing::error!(error = ?e, title = %truncate(&article.title, 70), "persist failed");
                Ok(ArticleOutcome::PersistFailed)
            }
        }
    }

    async fn record_snapshot(&self) -> Result<()> {
        let counts = self.store.active_counts().await?;
        let label = hour_label(Local::now());
        self.store
            .record_snapshot(&label, counts, Utc::now())
            .await
    }
}

/// Chart hour label in local time, e.g. `9AM`, `2PM`.
pub fn hour_label<Tz: chrono::TimeZone>(now: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%-I%p").to_string()
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hour_labels_match_chart_format() {
        let am = Utc.with_ymd_and_hms(2025, 8, 30, 9, 5, 0).unwrap();
        assert_eq!(hour_label(am), "9AM");
        let pm = Utc.with_ymd_and_hms(2025, 8, 30, 14, 0, 0).unwrap();
        assert_eq!(hour_label(pm), "2PM");
        let midnight = Utc.with_ymd_and_hms(2025, 8, 30, 0, 30, 0).unwrap();
        assert_eq!(hour_label(midnight), "12AM");
    }
}
