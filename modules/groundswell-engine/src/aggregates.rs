//! Aggregate updater — keeps the live Vote and Petition counters
//! synchronized with the set of active vigor contributions.
//!
//! Updates are delta-based. Every method here must be called with the
//! owning petition's lane held (see `EngagementStore::petition_lane`);
//! the lane is the per-petition critical section that prevents two
//! concurrent contributions from reading the same stale total.
//!
//! A missing vote or petition is logged and absorbed — a dangling
//! contribution never crashes the write path for unrelated petitions.

use tracing::warn;
use uuid::Uuid;

use groundswell_common::Vote;
use groundswell_store::EngagementStore;

/// Live petition totals after an aggregate update, as input for the
/// notification trigger evaluator.
#[derive(Debug, Clone, Copy)]
pub struct PetitionTotals {
    pub petition_id: Uuid,
    pub vote_count: u32,
    pub total_vigor: u64,
    pub reduced_threshold: u32,
}

/// Threshold reduction: discounts the base threshold as cumulative
/// vigor grows, bottoming out at 50% of the base once vigor reaches
/// the saturation point. Monotonically non-increasing in `total_vigor`.
pub fn reduced_threshold(base: u32, total_vigor: u64, saturation: u64) -> u32 {
    let factor = (1.0 - total_vigor as f64 / saturation as f64).max(0.5);
    (base as f64 * factor).round() as u32
}

pub struct AggregateUpdater {
    store: EngagementStore,
    vigor_saturation: u64,
}

impl AggregateUpdater {
    pub fn new(store: EngagementStore, vigor_saturation: u64) -> Self {
        Self {
            store,
            vigor_saturation,
        }
    }

    /// Fold a newly admitted contribution into the live counters.
    /// Returns `None` (logged, nothing mutated) if the vote or petition
    /// cannot be found.
    pub fn add_contribution(
        &self,
        vote_id: Uuid,
        petition_id: Uuid,
        amount: u32,
    ) -> Option<PetitionTotals> {
        if self.store.petition(petition_id).is_none() {
            warn!(%petition_id, amount, "Aggregate update skipped: petition not found");
            return None;
        }
        let vote_found = self.store.update_vote(vote_id, |v| {
            v.total_vigor += amount as u64;
            v.vigor_count += 1;
        });
        if !vote_found {
            warn!(%vote_id, amount, "Aggregate update skipped: vote not found");
            return None;
        }

        self.apply_petition_delta(petition_id, amount as i64)
    }

    /// Subtract a soft-deactivated contribution from the live counters.
    /// Totals clamp at zero; counts never underflow.
    pub fn remove_contribution(
        &self,
        vote_id: Uuid,
        petition_id: Uuid,
        amount: u32,
    ) -> Option<PetitionTotals> {
        if self.store.petition(petition_id).is_none() {
            warn!(%petition_id, amount, "Aggregate update skipped: petition not found");
            return None;
        }
        let vote_found = self.store.update_vote(vote_id, |v| {
            v.total_vigor = v.total_vigor.saturating_sub(amount as u64);
            v.vigor_count = v.vigor_count.saturating_sub(1);
        });
        if !vote_found {
            warn!(%vote_id, amount, "Aggregate update skipped: vote not found");
            return None;
        }

        self.apply_petition_delta(petition_id, -(amount as i64))
    }

    /// Release a whole vote: soft-deactivate its active contributions,
    /// zero its counters, deactivate it, and subtract the released
    /// vigor from the petition in one delta.
    pub fn release_vote(&self, vote: &Vote) -> Option<PetitionTotals> {
        if self.store.petition(vote.petition_id).is_none() {
            warn!(petition_id = %vote.petition_id, vote_id = %vote.id, "Vote release skipped: petition not found");
            return None;
        }

        let mut released: u64 = 0;
        for contribution in self.store.active_contributions_for_vote(vote.id) {
            self.store
                .update_contribution(contribution.id, |c| c.active = false);
            released += contribution.amount as u64;
        }

        self.store.update_vote(vote.id, |v| {
            v.total_vigor = 0;
            v.vigor_count = 0;
            v.active = false;
        });

        self.apply_petition_delta(vote.petition_id, -(released as i64))
    }

    /// Current totals for a petition, without applying any delta.
    pub fn petition_totals(&self, petition_id: Uuid) -> Option<PetitionTotals> {
        let petition = self.store.petition(petition_id)?;
        Some(PetitionTotals {
            petition_id,
            vote_count: self.store.active_vote_count(petition_id),
            total_vigor: petition.total_vigor,
            reduced_threshold: petition.reduced_threshold,
        })
    }

    fn apply_petition_delta(&self, petition_id: Uuid, delta: i64) -> Option<PetitionTotals> {
        let saturation = self.vigor_saturation;
        let mut updated = None;
        let found = self.store.update_petition(petition_id, |p| {
            p.total_vigor = if delta >= 0 {
                p.total_vigor + delta as u64
            } else {
                p.total_vigor.saturating_sub((-delta) as u64)
            };
            p.reduced_threshold =
                reduced_threshold(p.notification_threshold, p.total_vigor, saturation);
            updated = Some((p.total_vigor, p.reduced_threshold));
        });
        if !found {
            warn!(%petition_id, delta, "Aggregate update skipped: petition not found");
            return None;
        }

        let (total_vigor, reduced) = updated.expect("update closure ran");
        Some(PetitionTotals {
            petition_id,
            vote_count: self.store.active_vote_count(petition_id),
            total_vigor,
            reduced_threshold: reduced,
        })
    }
}
