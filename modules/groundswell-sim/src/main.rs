//! Synthetic engagement traffic harness.
//!
//! Seeds a few petitions, fires concurrent vote and vigor events
//! through the engine, lets the reconciler settle, and prints the
//! trending leaderboard.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use groundswell_common::{Config, EngagementEvent, PetitionSeed, SnapshotField, ThresholdCrossing};
use groundswell_engine::{EngagementEngine, NotificationSink};
use groundswell_reconcile::MetricsReconciler;
use groundswell_store::EngagementStore;

/// Sink that just logs crossings; stands in for the real dispatcher.
struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, crossing: &ThresholdCrossing) -> Result<()> {
        info!(
            petition_id = %crossing.petition_id,
            effective_votes = crossing.effective_votes,
            reduced_threshold = crossing.reduced_threshold,
            "NOTIFY: threshold crossed"
        );
        Ok(())
    }
}

const VOTERS_PER_PETITION: usize = 40;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("groundswell=info".parse()?))
        .init();

    info!("Groundswell sim starting...");

    let config = Config::from_env();
    let store = EngagementStore::new();
    let (reconcile, reconciler) = MetricsReconciler::new(store.clone(), &config);
    let engine = Arc::new(EngagementEngine::new(
        store.clone(),
        &config,
        Box::new(LogSink),
        reconcile,
    ));
    let worker = tokio::spawn(reconciler.run());

    let petitions: Vec<Uuid> = [
        ("Protect the riverfront park", 60),
        ("Fund the night bus line", 45),
        ("Repair the harbor bridge", 80),
    ]
    .into_iter()
    .map(|(title, threshold)| {
        store
            .register_petition(
                PetitionSeed::builder()
                    .title(title)
                    .notification_threshold(threshold)
                    .build(),
            )
            .id
    })
    .collect();

    // One task per petition; voters contribute a rotating mix of
    // activity kinds with deterministic payloads.
    let mut tasks = Vec::new();
    for (pi, petition_id) in petitions.iter().copied().enumerate() {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            for voter in 0..VOTERS_PER_PETITION {
                let vote_id = Uuid::new_v4();
                let user_id = Uuid::new_v4();
                engine
                    .apply(EngagementEvent::VoteCreated {
                        vote_id,
                        user_id,
                        petition_id,
                        statement: None,
                    })
                    .await?;

                // Every third voter backs the vote with vigor.
                if voter % 3 == 0 {
                    let (kind, payload) = synthetic_activity(pi, voter);
                    engine
                        .apply(EngagementEvent::VigorContributed {
                            contribution_id: Uuid::new_v4(),
                            vote_id,
                            user_id,
                            kind: kind.to_string(),
                            payload,
                            statement: None,
                        })
                        .await?;
                }
            }
            anyhow::Ok(())
        }));
    }
    for task in tasks {
        task.await??;
    }

    // Dropping the engine closes the queue; the worker drains what is
    // left and returns its stats.
    drop(engine);
    let stats = worker.await?;
    info!("Reconciler settled. {stats}");

    info!("Trending leaderboard:");
    for (rank, snapshot) in store
        .leaderboard(SnapshotField::TrendingScore, 10)
        .iter()
        .enumerate()
    {
        let title = store
            .petition(snapshot.petition_id)
            .map(|p| p.title)
            .unwrap_or_default();
        info!(
            rank = rank + 1,
            title = %title,
            votes = snapshot.vote_count,
            vigor = snapshot.total_vigor,
            trending = snapshot.trending_score,
            "leaderboard entry"
        );
    }

    Ok(())
}

fn synthetic_activity(petition_index: usize, voter: usize) -> (&'static str, serde_json::Value) {
    match (petition_index + voter) % 4 {
        0 => (
            "physical_activity",
            json!({ "duration_minutes": 10 + (voter % 6) * 10, "intensity": voter % 11 }),
        ),
        1 => (
            "voice_recording",
            json!({ "duration_seconds": 20 + (voter % 10) * 12, "clarity": 40 + voter % 60 }),
        ),
        2 => (
            "written_statement",
            json!({
                "word_count": 50 + (voter % 10) * 50,
                "originality": 30 + voter % 70,
                "emotional_tone": (["hopeful", "determined", "concerned", "passionate"][voter % 4]),
            }),
        ),
        _ => (
            "community_outreach",
            json!({ "people_reached": 5 + voter % 46, "hours_spent": voter % 11 }),
        ),
    }
}
