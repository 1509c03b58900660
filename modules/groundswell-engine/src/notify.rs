//! Notification trigger evaluation.
//!
//! The evaluator is a pure decision function over current totals —
//! idempotent by construction, so the resulting signal is safe for
//! at-least-once delivery by whatever dispatcher consumes it.

use async_trait::async_trait;

use groundswell_common::ThresholdCrossing;

use crate::aggregates::PetitionTotals;

/// Blended support measure: every 100 points of vigor counts as one
/// additional vote.
pub fn effective_votes(vote_count: u32, total_vigor: u64) -> u64 {
    vote_count as u64 + total_vigor / 100
}

/// Decide whether current totals cross the (possibly reduced)
/// notification threshold. No side effects.
pub fn evaluate(totals: &PetitionTotals) -> Option<ThresholdCrossing> {
    let effective = effective_votes(totals.vote_count, totals.total_vigor);
    if effective >= totals.reduced_threshold as u64 {
        Some(ThresholdCrossing {
            petition_id: totals.petition_id,
            vote_count: totals.vote_count,
            total_vigor: totals.total_vigor,
            effective_votes: effective,
            reduced_threshold: totals.reduced_threshold,
        })
    } else {
        None
    }
}

/// Pluggable sink for threshold-crossing signals. The out-of-scope
/// notification workflow lives behind this seam.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, crossing: &ThresholdCrossing) -> anyhow::Result<()>;
}

/// No-op sink for tests and headless use.
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn send(&self, _crossing: &ThresholdCrossing) -> anyhow::Result<()> {
        Ok(())
    }
}
