//! Full recompute of one petition's metrics snapshot from source
//! records. The snapshot is the only output; live counters are never
//! touched here.

use anyhow::{anyhow, Result};
use chrono::Utc;
use uuid::Uuid;

use groundswell_common::PetitionMetricsSnapshot;
use groundswell_store::EngagementStore;

/// Scan a petition's active votes and vigor contributions, recompute
/// the denormalized metrics, and upsert the snapshot. Idempotent:
/// rerunning without intervening writes yields the same metrics.
pub fn reconcile_petition(
    store: &EngagementStore,
    petition_id: Uuid,
) -> Result<PetitionMetricsSnapshot> {
    store
        .petition(petition_id)
        .ok_or_else(|| anyhow!("petition {petition_id} not found"))?;

    let vote_count = store.active_vote_count(petition_id);
    let contributions = store.active_contributions_for_petition(petition_id);
    let vigor_count = contributions.len() as u32;
    let total_vigor: u64 = contributions.iter().map(|c| c.amount as u64).sum();

    let snapshot = PetitionMetricsSnapshot {
        petition_id,
        vote_count,
        vigor_count,
        total_vigor,
        trending_score: vote_count as f64 + total_vigor as f64 / 100.0,
        updated_at: Utc::now(),
    };
    store.upsert_snapshot(snapshot.clone());
    Ok(snapshot)
}
