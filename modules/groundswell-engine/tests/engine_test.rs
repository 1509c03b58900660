//! Integration tests for the engagement write path: guard, scoring,
//! live aggregates, threshold reduction, and notification triggering.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use groundswell_common::{
    Config, EngagementEvent, GroundswellError, PetitionSeed, ThresholdCrossing,
};
use groundswell_engine::{EngagementEngine, EngagementOutcome, NotificationSink};
use groundswell_reconcile::MetricsReconciler;
use groundswell_store::EngagementStore;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Sink that counts every crossing it receives.
struct CountingSink {
    crossings: Arc<AtomicUsize>,
}

#[async_trait]
impl NotificationSink for CountingSink {
    async fn send(&self, _crossing: &ThresholdCrossing) -> anyhow::Result<()> {
        self.crossings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that hangs on the first crossing it receives and completes
/// every later one immediately.
struct StallingSink {
    stalled: AtomicBool,
}

#[async_trait]
impl NotificationSink for StallingSink {
    async fn send(&self, _crossing: &ThresholdCrossing) -> anyhow::Result<()> {
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(())
    }
}

/// Sink that always fails, for verifying failures are absorbed.
struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn send(&self, _crossing: &ThresholdCrossing) -> anyhow::Result<()> {
        anyhow::bail!("sink unavailable")
    }
}

struct Harness {
    engine: EngagementEngine,
    store: EngagementStore,
    crossings: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let store = EngagementStore::new();
    let config = Config::default();
    let (handle, _reconciler) = MetricsReconciler::new(store.clone(), &config);
    let crossings = Arc::new(AtomicUsize::new(0));
    let sink = CountingSink {
        crossings: crossings.clone(),
    };
    let engine = EngagementEngine::new(store.clone(), &config, Box::new(sink), handle);
    Harness {
        engine,
        store,
        crossings,
    }
}

fn seed_petition(store: &EngagementStore, threshold: u32) -> Uuid {
    store
        .register_petition(
            PetitionSeed::builder()
                .title("Fix the bridge")
                .notification_threshold(threshold)
                .build(),
        )
        .id
}

async fn cast_vote(engine: &EngagementEngine, petition_id: Uuid) -> (Uuid, Uuid) {
    let vote_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    engine
        .apply(EngagementEvent::VoteCreated {
            vote_id,
            user_id,
            petition_id,
            statement: None,
        })
        .await
        .unwrap();
    (vote_id, user_id)
}

/// Physical-activity payload engineered to score exactly `amount`
/// (duration carries weight 0.6 against a 60-minute cap).
fn payload_scoring(amount: u32) -> serde_json::Value {
    assert!(amount <= 60, "only amounts up to 60 map to duration alone");
    json!({ "duration_minutes": amount as f64, "intensity": 0 })
}

/// Payload at both caps, scoring exactly 100.
fn max_payload() -> serde_json::Value {
    json!({ "duration_minutes": 60, "intensity": 10 })
}

async fn contribute(
    engine: &EngagementEngine,
    vote_id: Uuid,
    user_id: Uuid,
    payload: serde_json::Value,
) -> Result<EngagementOutcome, GroundswellError> {
    engine
        .apply(EngagementEvent::VigorContributed {
            contribution_id: Uuid::new_v4(),
            vote_id,
            user_id,
            kind: "physical_activity".to_string(),
            payload,
            statement: None,
        })
        .await
}

fn active_vigor_sum_for_vote(store: &EngagementStore, vote_id: Uuid) -> u64 {
    store
        .active_contributions_for_vote(vote_id)
        .iter()
        .map(|c| c.amount as u64)
        .sum()
}

fn active_vigor_sum_for_petition(store: &EngagementStore, petition_id: Uuid) -> u64 {
    store
        .active_contributions_for_petition(petition_id)
        .iter()
        .map(|c| c.amount as u64)
        .sum()
}

// =========================================================================
// Live counters
// =========================================================================

#[tokio::test]
async fn contribution_updates_vote_and_petition_counters() {
    let h = harness();
    let petition_id = seed_petition(&h.store, 1000);
    let (vote_id, user_id) = cast_vote(&h.engine, petition_id).await;

    let outcome = contribute(&h.engine, vote_id, user_id, payload_scoring(40))
        .await
        .unwrap();
    let EngagementOutcome::VigorContributed {
        amount, degraded, ..
    } = outcome
    else {
        panic!("wrong outcome variant");
    };
    assert_eq!(amount, 40);
    assert!(!degraded);

    let vote = h.store.vote(vote_id).unwrap();
    assert_eq!(vote.total_vigor, 40);
    assert_eq!(vote.vigor_count, 1);

    let petition = h.store.petition(petition_id).unwrap();
    assert_eq!(petition.total_vigor, 40);
}

#[tokio::test]
async fn removal_subtracts_exactly_and_never_goes_negative() {
    let h = harness();
    let petition_id = seed_petition(&h.store, 1000);
    let (vote_id, user_id) = cast_vote(&h.engine, petition_id).await;

    let contribution_id = Uuid::new_v4();
    h.engine
        .apply(EngagementEvent::VigorContributed {
            contribution_id,
            vote_id,
            user_id,
            kind: "physical_activity".to_string(),
            payload: payload_scoring(40),
            statement: None,
        })
        .await
        .unwrap();

    h.engine
        .apply(EngagementEvent::VigorRemoved { contribution_id })
        .await
        .unwrap();

    let vote = h.store.vote(vote_id).unwrap();
    assert_eq!(vote.total_vigor, 0);
    assert_eq!(vote.vigor_count, 0);
    assert_eq!(h.store.petition(petition_id).unwrap().total_vigor, 0);

    // The record survives as inactive history, not a deletion.
    let record = h.store.contribution(contribution_id).unwrap();
    assert!(!record.active);
    assert_eq!(record.amount, 40);

    // Double removal is a caller error, not a double subtraction.
    let err = h
        .engine
        .apply(EngagementEvent::VigorRemoved { contribution_id })
        .await
        .unwrap_err();
    assert!(matches!(err, GroundswellError::Validation(_)));
    assert_eq!(h.store.petition(petition_id).unwrap().total_vigor, 0);
}

#[tokio::test]
async fn conservation_holds_over_mixed_sequences() {
    let h = harness();
    let petition_id = seed_petition(&h.store, 1000);
    let (vote_id, user_id) = cast_vote(&h.engine, petition_id).await;

    let mut ids = Vec::new();
    for amount in [10u32, 25, 40, 60] {
        let contribution_id = Uuid::new_v4();
        h.engine
            .apply(EngagementEvent::VigorContributed {
                contribution_id,
                vote_id,
                user_id,
                kind: "physical_activity".to_string(),
                payload: payload_scoring(amount),
                statement: None,
            })
            .await
            .unwrap();
        ids.push(contribution_id);
    }

    // Remove two of the four.
    for id in [ids[0], ids[2]] {
        h.engine
            .apply(EngagementEvent::VigorRemoved { contribution_id: id })
            .await
            .unwrap();
    }

    let vote = h.store.vote(vote_id).unwrap();
    assert_eq!(vote.total_vigor, active_vigor_sum_for_vote(&h.store, vote_id));
    assert_eq!(vote.vigor_count, 2);

    let petition = h.store.petition(petition_id).unwrap();
    assert_eq!(
        petition.total_vigor,
        active_vigor_sum_for_petition(&h.store, petition_id)
    );
    assert_eq!(petition.total_vigor, 25 + 60);
}

#[tokio::test]
async fn vote_removal_releases_all_active_vigor() {
    let h = harness();
    let petition_id = seed_petition(&h.store, 1000);
    let (vote_id, user_id) = cast_vote(&h.engine, petition_id).await;
    let (other_vote, other_user) = cast_vote(&h.engine, petition_id).await;

    contribute(&h.engine, vote_id, user_id, payload_scoring(40))
        .await
        .unwrap();
    contribute(&h.engine, vote_id, user_id, payload_scoring(20))
        .await
        .unwrap();
    contribute(&h.engine, other_vote, other_user, payload_scoring(30))
        .await
        .unwrap();

    let outcome = h
        .engine
        .apply(EngagementEvent::VoteRemoved { vote_id })
        .await
        .unwrap();
    let EngagementOutcome::VoteRemoved { vigor_released, .. } = outcome else {
        panic!("wrong outcome variant");
    };
    assert_eq!(vigor_released, 60);

    let vote = h.store.vote(vote_id).unwrap();
    assert!(!vote.active);
    assert_eq!(vote.total_vigor, 0);

    // The other vote's vigor is untouched.
    let petition = h.store.petition(petition_id).unwrap();
    assert_eq!(petition.total_vigor, 30);
    assert_eq!(h.store.active_vote_count(petition_id), 1);
}

// =========================================================================
// Integrity guard
// =========================================================================

#[tokio::test]
async fn mismatched_owner_is_rejected_and_never_persists() {
    let h = harness();
    let petition_id = seed_petition(&h.store, 1000);
    let (vote_id, _user_id) = cast_vote(&h.engine, petition_id).await;

    let contribution_id = Uuid::new_v4();
    let err = h
        .engine
        .apply(EngagementEvent::VigorContributed {
            contribution_id,
            vote_id,
            user_id: Uuid::new_v4(), // not the vote's owner
            kind: "physical_activity".to_string(),
            payload: max_payload(),
            statement: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GroundswellError::ReferentialMismatch(_)));
    assert!(h.store.contribution(contribution_id).is_none());
    assert_eq!(h.store.petition(petition_id).unwrap().total_vigor, 0);
}

#[tokio::test]
async fn contribution_to_unknown_vote_is_rejected() {
    let h = harness();
    seed_petition(&h.store, 1000);

    let err = contribute(&h.engine, Uuid::new_v4(), Uuid::new_v4(), max_payload())
        .await
        .unwrap_err();
    assert!(matches!(err, GroundswellError::ReferentialMismatch(_)));
}

#[tokio::test]
async fn invalid_payload_is_rejected_before_anything_persists() {
    let h = harness();
    let petition_id = seed_petition(&h.store, 1000);
    let (vote_id, user_id) = cast_vote(&h.engine, petition_id).await;

    let err = contribute(&h.engine, vote_id, user_id, json!({"intensity": 5}))
        .await
        .unwrap_err();
    assert!(matches!(err, GroundswellError::Validation(_)));
    assert_eq!(h.store.vote(vote_id).unwrap().vigor_count, 0);
}

#[tokio::test]
async fn duplicate_active_vote_is_rejected() {
    let h = harness();
    let petition_id = seed_petition(&h.store, 1000);
    let user_id = Uuid::new_v4();

    h.engine
        .apply(EngagementEvent::VoteCreated {
            vote_id: Uuid::new_v4(),
            user_id,
            petition_id,
            statement: None,
        })
        .await
        .unwrap();

    let err = h
        .engine
        .apply(EngagementEvent::VoteCreated {
            vote_id: Uuid::new_v4(),
            user_id,
            petition_id,
            statement: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GroundswellError::Validation(_)));
    assert_eq!(h.store.active_vote_count(petition_id), 1);
}

// =========================================================================
// Threshold reduction and notification
// =========================================================================

#[tokio::test]
async fn worked_example_reduces_threshold_and_triggers() {
    // Petition with base threshold 1000. 400 votes plus 10,000
    // cumulative vigor → reduced threshold 500, effective votes
    // 400 + floor(10000/100) = 500 → trigger fires.
    let h = harness();
    let petition_id = seed_petition(&h.store, 1000);

    let mut voters = Vec::new();
    for _ in 0..400 {
        voters.push(cast_vote(&h.engine, petition_id).await);
    }

    // 100 max-scoring contributions of 100 vigor each, spread over the
    // first 100 voters.
    let mut last = None;
    for (vote_id, user_id) in voters.iter().take(100) {
        last = Some(
            contribute(&h.engine, *vote_id, *user_id, max_payload())
                .await
                .unwrap(),
        );
    }

    let petition = h.store.petition(petition_id).unwrap();
    assert_eq!(petition.total_vigor, 10_000);
    assert_eq!(petition.reduced_threshold, 500);

    let Some(EngagementOutcome::VigorContributed { notified, .. }) = last else {
        panic!("wrong outcome variant");
    };
    assert!(notified);
    assert!(h.crossings.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn below_threshold_stays_silent() {
    let h = harness();
    let petition_id = seed_petition(&h.store, 1000);
    let (vote_id, user_id) = cast_vote(&h.engine, petition_id).await;

    contribute(&h.engine, vote_id, user_id, payload_scoring(40))
        .await
        .unwrap();

    assert_eq!(h.crossings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reduced_threshold_never_drops_below_half_base() {
    let h = harness();
    let petition_id = seed_petition(&h.store, 100);
    let (vote_id, user_id) = cast_vote(&h.engine, petition_id).await;

    // Pile on far more vigor than the saturation point.
    for _ in 0..150 {
        contribute(&h.engine, vote_id, user_id, max_payload())
            .await
            .unwrap();
    }

    let petition = h.store.petition(petition_id).unwrap();
    assert_eq!(petition.total_vigor, 15_000);
    assert_eq!(petition.reduced_threshold, 50);
}

#[tokio::test]
async fn sink_failure_does_not_fail_the_write() {
    let store = EngagementStore::new();
    let config = Config::default();
    let (handle, _reconciler) = MetricsReconciler::new(store.clone(), &config);
    let engine = EngagementEngine::new(store.clone(), &config, Box::new(FailingSink), handle);

    let petition_id = seed_petition(&store, 1);
    let outcome = engine
        .apply(EngagementEvent::VoteCreated {
            vote_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            petition_id,
            statement: None,
        })
        .await
        .unwrap();

    // One vote >= reduced threshold of 1, so the crossing fired and the
    // sink failed — but the vote itself committed.
    let EngagementOutcome::VoteCreated { notified, .. } = outcome else {
        panic!("wrong outcome variant");
    };
    assert!(notified);
    assert_eq!(store.active_vote_count(petition_id), 1);
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test]
async fn stalled_sink_does_not_block_other_writes_to_the_petition() {
    let store = EngagementStore::new();
    let config = Config::default();
    let (handle, _reconciler) = MetricsReconciler::new(store.clone(), &config);
    let sink = StallingSink {
        stalled: AtomicBool::new(false),
    };
    let engine = Arc::new(EngagementEngine::new(
        store.clone(),
        &config,
        Box::new(sink),
        handle,
    ));

    // Threshold 1: every vote crosses and reaches the sink.
    let petition_id = seed_petition(&store, 1);

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { cast_vote(&engine, petition_id).await })
    };
    // Let the first write commit and park inside the sink.
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The petition lane is released before sink delivery, so a second
    // user's vote on the same petition commits while the first
    // crossing is still in flight.
    let second = tokio::time::timeout(Duration::from_secs(2), cast_vote(&engine, petition_id)).await;
    assert!(second.is_ok(), "second vote blocked behind the stalled sink");
    assert_eq!(store.active_vote_count(petition_id), 2);
    first.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_contributions_conserve_petition_totals() {
    let h = harness();
    let petition_id = seed_petition(&h.store, 1_000_000);
    let engine = Arc::new(h.engine);

    let mut voters = Vec::new();
    for _ in 0..10 {
        voters.push(cast_vote(&engine, petition_id).await);
    }

    let mut tasks = Vec::new();
    for (vote_id, user_id) in voters {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            for amount in [10u32, 20, 30, 40, 50] {
                contribute(
                    &engine,
                    vote_id,
                    user_id,
                    json!({ "duration_minutes": amount as f64, "intensity": 0 }),
                )
                .await
                .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let petition = h.store.petition(petition_id).unwrap();
    assert_eq!(petition.total_vigor, 10 * (10 + 20 + 30 + 40 + 50));
    assert_eq!(
        petition.total_vigor,
        active_vigor_sum_for_petition(&h.store, petition_id)
    );

    for vote in h.store.active_votes_for_petition(petition_id) {
        assert_eq!(vote.total_vigor, 150);
        assert_eq!(vote.vigor_count, 5);
    }
}
