//! The single shared in-process store.
//!
//! All engagement state lives here: petitions, votes, vigor
//! contributions, and the reconciler's metrics snapshots, with
//! secondary indexes for the read paths. The interior `RwLock` is held
//! only for individual map operations; the per-petition mutex lanes
//! serialize the aggregate read-modify-write sequence without a global
//! write lock, so contributions to different petitions never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, RwLock};

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use groundswell_common::{
    Petition, PetitionMetricsSnapshot, PetitionSeed, SnapshotField, VigorContribution, Vote,
};

#[derive(Default)]
struct StoreData {
    petitions: HashMap<Uuid, Petition>,
    votes: HashMap<Uuid, Vote>,
    contributions: HashMap<Uuid, VigorContribution>,
    snapshots: HashMap<Uuid, PetitionMetricsSnapshot>,

    votes_by_petition: HashMap<Uuid, Vec<Uuid>>,
    contributions_by_vote: HashMap<Uuid, Vec<Uuid>>,
    contributions_by_petition: HashMap<Uuid, Vec<Uuid>>,
    vote_by_user_petition: HashMap<(Uuid, Uuid), Uuid>,
}

struct Inner {
    data: RwLock<StoreData>,
    lanes: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Cheaply cloneable handle to the shared store.
#[derive(Clone)]
pub struct EngagementStore {
    inner: Arc<Inner>,
}

impl Default for EngagementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EngagementStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(StoreData::default()),
                lanes: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// Acquire the serialization lane for one petition. Held across the
    /// aggregate read-modify-write; lanes for different petitions are
    /// independent.
    pub async fn petition_lane(&self, petition_id: Uuid) -> OwnedMutexGuard<()> {
        let lane = {
            let mut lanes = self
                .inner
                .lanes
                .lock()
                .expect("lane table lock poisoned");
            lanes
                .entry(petition_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lane.lock_owned().await
    }

    // =====================================================================
    // Petitions
    // =====================================================================

    /// Register a new petition. Returns the stored record.
    pub fn register_petition(&self, seed: PetitionSeed) -> Petition {
        let petition = Petition {
            id: Uuid::new_v4(),
            title: seed.title,
            total_vigor: 0,
            notification_threshold: seed.notification_threshold,
            reduced_threshold: seed.notification_threshold,
            active: true,
            created_at: Utc::now(),
        };
        let mut data = self.write();
        data.petitions.insert(petition.id, petition.clone());
        petition
    }

    pub fn petition(&self, id: Uuid) -> Option<Petition> {
        self.read().petitions.get(&id).cloned()
    }

    pub fn petition_ids(&self) -> Vec<Uuid> {
        self.read().petitions.keys().copied().collect()
    }

    /// Apply a mutation to one petition. Returns false if it does not exist.
    pub fn update_petition(&self, id: Uuid, f: impl FnOnce(&mut Petition)) -> bool {
        let mut data = self.write();
        match data.petitions.get_mut(&id) {
            Some(p) => {
                f(p);
                true
            }
            None => false,
        }
    }

    // =====================================================================
    // Votes
    // =====================================================================

    /// Insert a vote and index it. The caller has already checked
    /// (user, petition) uniqueness under the petition lane.
    pub fn insert_vote(&self, vote: Vote) {
        let mut data = self.write();
        data.votes_by_petition
            .entry(vote.petition_id)
            .or_default()
            .push(vote.id);
        data.vote_by_user_petition
            .insert((vote.user_id, vote.petition_id), vote.id);
        data.votes.insert(vote.id, vote);
    }

    pub fn vote(&self, id: Uuid) -> Option<Vote> {
        self.read().votes.get(&id).cloned()
    }

    /// The active vote one user holds on one petition, if any.
    pub fn active_vote_for(&self, user_id: Uuid, petition_id: Uuid) -> Option<Vote> {
        let data = self.read();
        let id = data.vote_by_user_petition.get(&(user_id, petition_id))?;
        data.votes.get(id).filter(|v| v.active).cloned()
    }

    pub fn active_votes_for_petition(&self, petition_id: Uuid) -> Vec<Vote> {
        let data = self.read();
        data.votes_by_petition
            .get(&petition_id)
            .into_iter()
            .flatten()
            .filter_map(|id| data.votes.get(id))
            .filter(|v| v.active)
            .cloned()
            .collect()
    }

    pub fn active_vote_count(&self, petition_id: Uuid) -> u32 {
        let data = self.read();
        data.votes_by_petition
            .get(&petition_id)
            .into_iter()
            .flatten()
            .filter_map(|id| data.votes.get(id))
            .filter(|v| v.active)
            .count() as u32
    }

    /// Apply a mutation to one vote. Returns false if it does not exist.
    pub fn update_vote(&self, id: Uuid, f: impl FnOnce(&mut Vote)) -> bool {
        let mut data = self.write();
        match data.votes.get_mut(&id) {
            Some(v) => {
                f(v);
                true
            }
            None => false,
        }
    }

    // =====================================================================
    // Vigor contributions
    // =====================================================================

    /// Insert a contribution and index it under its vote and petition.
    pub fn insert_contribution(&self, contribution: VigorContribution) {
        let mut data = self.write();
        data.contributions_by_vote
            .entry(contribution.vote_id)
            .or_default()
            .push(contribution.id);
        data.contributions_by_petition
            .entry(contribution.petition_id)
            .or_default()
            .push(contribution.id);
        data.contributions.insert(contribution.id, contribution);
    }

    pub fn contribution(&self, id: Uuid) -> Option<VigorContribution> {
        self.read().contributions.get(&id).cloned()
    }

    pub fn active_contributions_for_vote(&self, vote_id: Uuid) -> Vec<VigorContribution> {
        let data = self.read();
        data.contributions_by_vote
            .get(&vote_id)
            .into_iter()
            .flatten()
            .filter_map(|id| data.contributions.get(id))
            .filter(|c| c.active)
            .cloned()
            .collect()
    }

    pub fn active_contributions_for_petition(&self, petition_id: Uuid) -> Vec<VigorContribution> {
        let data = self.read();
        data.contributions_by_petition
            .get(&petition_id)
            .into_iter()
            .flatten()
            .filter_map(|id| data.contributions.get(id))
            .filter(|c| c.active)
            .cloned()
            .collect()
    }

    /// Apply a mutation to one contribution. Returns false if it does
    /// not exist.
    pub fn update_contribution(&self, id: Uuid, f: impl FnOnce(&mut VigorContribution)) -> bool {
        let mut data = self.write();
        match data.contributions.get_mut(&id) {
            Some(c) => {
                f(c);
                true
            }
            None => false,
        }
    }

    // =====================================================================
    // Metrics snapshots
    // =====================================================================

    /// Upsert a petition's snapshot. Only the reconciler calls this.
    pub fn upsert_snapshot(&self, snapshot: PetitionMetricsSnapshot) {
        let mut data = self.write();
        data.snapshots.insert(snapshot.petition_id, snapshot);
    }

    pub fn snapshot(&self, petition_id: Uuid) -> Option<PetitionMetricsSnapshot> {
        self.read().snapshots.get(&petition_id).cloned()
    }

    /// Snapshots sorted descending by the requested field, capped at
    /// `limit`. Backs the analytics/leaderboard read path.
    pub fn leaderboard(&self, field: SnapshotField, limit: usize) -> Vec<PetitionMetricsSnapshot> {
        let mut rows: Vec<PetitionMetricsSnapshot> =
            self.read().snapshots.values().cloned().collect();
        rows.sort_by(|a, b| {
            let ord = match field {
                SnapshotField::VoteCount => a.vote_count.cmp(&b.vote_count),
                SnapshotField::VigorCount => a.vigor_count.cmp(&b.vigor_count),
                SnapshotField::TotalVigor => a.total_vigor.cmp(&b.total_vigor),
                SnapshotField::TrendingScore => a
                    .trending_score
                    .partial_cmp(&b.trending_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            };
            ord.reverse()
        });
        rows.truncate(limit);
        rows
    }

    // =====================================================================
    // Lock helpers
    // =====================================================================

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreData> {
        self.inner.data.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreData> {
        self.inner.data.write().expect("store lock poisoned")
    }
}
