//! # Conflict Resolver
//!
//! Prevents two disagreeing active signals for the same ticker from both
//! being visible, and makes the disagreement explicit instead of silent.
//!
//! Only (BUY, SELL) conflict; WATCH and AVOID never participate. The scan
//! covers active signals ingested in the trailing 24 hours, most recent
//! first, and resolves at most one conflict per new judgment — first match
//! by recency, not a multi-way merge.
//!
//! The confidence-gap thresholds are deliberately coarse (15 points) so
//! noisy scores do not cause oscillation. The three-way split turns source
//! disagreement into a bounded, auditable outcome:
//!
//! - new clearly stronger  → override, old deactivated, provenance noted
//! - new clearly weaker    → suppress the new judgment (log only)
//! - comparable confidence → deactivate old, downgrade new to WATCH with a
//!   disclosure narrative naming both kinds

use crate::analyze::judgment::{SignalKind, ValidatedJudgment};
use crate::store::SignalRow;

/// Confidence gap beyond which one side clearly wins.
pub const CONFIDENCE_GAP: f64 = 0.15;

/// What the gap arithmetic alone decides, before any narrative rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapOutcome {
    /// `new - old > 0.15`: the new judgment replaces the old signal.
    Override,
    /// `new - old < -0.15`: the old signal stands, the new one is dropped.
    Suppress,
    /// `|new - old| <= 0.15`: neither wins; merge to WATCH.
    Merge,
}

/// Pure policy: classify the confidence gap between an existing active
/// signal and a new conflicting judgment.
pub fn gap_outcome(old_confidence: f64, new_confidence: f64) -> GapOutcome {
    let gap = new_confidence - old_confidence;
    if gap > CONFIDENCE_GAP {
        GapOutcome::Override
    } else if gap < -CONFIDENCE_GAP {
        GapOutcome::Suppress
    } else {
        GapOutcome::Merge
    }
}

/// Final decision for one judgment against the active window.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Persist this (possibly rewritten) judgment; deactivate the superseded
    /// row first when `deactivate` is set. Deactivation and insert must land
    /// in the same transaction.
    Store {
        judgment: ValidatedJudgment,
        deactivate: Option<i64>,
    },
    /// Drop the new judgment entirely; the existing signal stands. The only
    /// record of the suppressed judgment is a log line — accepted loss.
    Discard { superseded_by: i64 },
}

/// Find the first (most recent) active signal that conflicts with `judgment`.
/// `active` must already be ordered most-recent-first, as
/// `Store::active_in_window` returns it.
fn find_conflict<'a>(active: &'a [SignalRow], judgment: &ValidatedJudgment) -> Option<&'a SignalRow> {
    let conflicting = judgment.kind.conflicting_kind()?;
    active.iter().find(|row| {
        row.kind() == Some(conflicting)
            && row
                .tickers_vec()
                .iter()
                .any(|t| judgment.tickers.iter().any(|n| n == t))
    })
}

/// Resolve one validated judgment against the active window.
pub fn resolve(judgment: ValidatedJudgment, active: &[SignalRow]) -> Resolution {
    let Some(existing) = find_conflict(active, &judgment) else {
        return Resolution::Store {
            judgment,
            deactivate: None,
        };
    };

    let old_conf = existing.confidence;
    let new_conf = judgment.confidence;

    match gap_outcome(old_conf, new_conf) {
        GapOutcome::Override => {
            let mut j = judgment;
            let note = format!(
                " [Overrides an earlier {} signal on {} (confidence {:.2} vs {:.2}, +{:.2}).]",
                existing.signal,
                existing.tickers_vec().join(", "),
                new_conf,
                old_conf,
                new_conf - old_conf,
            );
            j.reasoning.push_str(&note);
            tracing::info!(
                superseded = existing.id,
                old_kind = %existing.signal,
                new_kind = %j.kind.as_str(),
                gap = new_conf - old_conf,
                "conflict override"
            );
            Resolution::Store {
                judgment: j,
                deactivate: Some(existing.id),
            }
        }
        GapOutcome::Suppress => {
            tracing::info!(
                existing = existing.id,
                existing_kind = %existing.signal,
                suppressed_kind = %judgment.kind.as_str(),
                gap = new_conf - old_conf,
                "conflict suppress: existing signal stands"
            );
            Resolution::Discard {
                superseded_by: existing.id,
            }
        }
        GapOutcome::Merge => {
            let old_kind = existing.signal.clone();
            let new_kind = judgment.kind.as_str();
            let tickers = judgment.tickers.join(", ");
            let merged_conf = (old_conf + new_conf) / 2.0;

            let mut j = judgment;
            j.kind = SignalKind::Watch;
            j.confidence = merged_conf;
            j.summary = format!(
                "Sources disagree on {tickers}: one says {old_kind}, another says {new_kind}. \
                 Downgraded to WATCH until the picture clears."
            );
            j.reasoning = format!(
                "An earlier signal called {old_kind} with confidence {old_conf:.2}; a newer \
                 article calls {new_kind} with confidence {new_conf:.2}. The gap is too small \
                 to pick a side, so both are replaced by a single WATCH at the mean \
                 confidence {merged_conf:.2}. Wait for confirmation before acting."
            );
            j.signal_logic =
                format!("Conflicting {old_kind}/{new_kind} coverage — watch, do not act yet.");

            tracing::info!(
                superseded = existing.id,
                old_kind = %old_kind,
                new_kind = %new_kind,
                merged_confidence = merged_conf,
                "conflict merge to WATCH"
            );
            Resolution::Store {
                judgment: j,
                deactivate: Some(existing.id),
            }
        }
    }
}
