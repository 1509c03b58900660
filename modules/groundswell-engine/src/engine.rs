//! The synchronous write path.
//!
//! Consumes engagement events from the surrounding application:
//! guard/validate, persist the source record, fold it into the live
//! aggregates under the petition's lane, evaluate the notification
//! trigger, and enqueue the petition for asynchronous snapshot
//! reconciliation.
//!
//! Validation and integrity failures propagate to the caller — the
//! write is rejected. Aggregate update failures are absorbed: the
//! source record is ground truth and the outcome only reports the
//! write as degraded.

use tracing::{info, warn};
use uuid::Uuid;

use groundswell_common::{Config, EngagementEvent, GroundswellError, VigorContribution, Vote};
use groundswell_reconcile::ReconcileHandle;
use groundswell_store::EngagementStore;

use crate::aggregates::{AggregateUpdater, PetitionTotals};
use crate::guard;
use crate::notify::{self, NotificationSink};
use crate::scorer;

/// Result of applying one engagement event.
#[derive(Debug, Clone)]
pub enum EngagementOutcome {
    VoteCreated {
        vote_id: Uuid,
        notified: bool,
    },
    VoteRemoved {
        vote_id: Uuid,
        vigor_released: u64,
        notified: bool,
        degraded: bool,
    },
    VigorContributed {
        contribution_id: Uuid,
        amount: u32,
        notified: bool,
        degraded: bool,
    },
    VigorRemoved {
        contribution_id: Uuid,
        amount: u32,
        notified: bool,
        degraded: bool,
    },
}

pub struct EngagementEngine {
    store: EngagementStore,
    updater: AggregateUpdater,
    notifier: Box<dyn NotificationSink>,
    reconcile: ReconcileHandle,
}

impl EngagementEngine {
    pub fn new(
        store: EngagementStore,
        config: &Config,
        notifier: Box<dyn NotificationSink>,
        reconcile: ReconcileHandle,
    ) -> Self {
        let updater = AggregateUpdater::new(store.clone(), config.vigor_saturation);
        Self {
            store,
            updater,
            notifier,
            reconcile,
        }
    }

    pub fn store(&self) -> &EngagementStore {
        &self.store
    }

    /// Apply one engagement event.
    pub async fn apply(&self, event: EngagementEvent) -> Result<EngagementOutcome, GroundswellError> {
        match event {
            EngagementEvent::VoteCreated {
                vote_id,
                user_id,
                petition_id,
                statement,
            } => {
                self.handle_vote_created(vote_id, user_id, petition_id, statement)
                    .await
            }
            EngagementEvent::VoteRemoved { vote_id } => self.handle_vote_removed(vote_id).await,
            EngagementEvent::VigorContributed {
                contribution_id,
                vote_id,
                user_id,
                kind,
                payload,
                statement,
            } => {
                self.handle_vigor_contributed(
                    contribution_id,
                    vote_id,
                    user_id,
                    &kind,
                    payload,
                    statement,
                )
                .await
            }
            EngagementEvent::VigorRemoved { contribution_id } => {
                self.handle_vigor_removed(contribution_id).await
            }
        }
    }

    async fn handle_vote_created(
        &self,
        vote_id: Uuid,
        user_id: Uuid,
        petition_id: Uuid,
        statement: Option<String>,
    ) -> Result<EngagementOutcome, GroundswellError> {
        if vote_id.is_nil() || user_id.is_nil() || petition_id.is_nil() {
            return Err(GroundswellError::MissingReference(
                "vote event carries a nil reference".to_string(),
            ));
        }
        if self.store.petition(petition_id).is_none() {
            return Err(GroundswellError::MissingReference(format!(
                "petition {petition_id} does not exist"
            )));
        }

        let lane = self.store.petition_lane(petition_id).await;

        if self.store.active_vote_for(user_id, petition_id).is_some() {
            return Err(GroundswellError::Validation(format!(
                "user {user_id} already holds an active vote on petition {petition_id}"
            )));
        }

        self.store.insert_vote(Vote {
            id: vote_id,
            user_id,
            petition_id,
            statement,
            total_vigor: 0,
            vigor_count: 0,
            active: true,
            created_at: chrono::Utc::now(),
        });
        info!(%vote_id, %petition_id, "Vote created");

        // Totals are captured by value; the sink await must not run
        // under the lane.
        let totals = self.updater.petition_totals(petition_id);
        drop(lane);

        let notified = match totals {
            Some(totals) => self.evaluate_and_notify(&totals).await,
            None => false,
        };
        self.reconcile.enqueue(petition_id);

        Ok(EngagementOutcome::VoteCreated { vote_id, notified })
    }

    async fn handle_vote_removed(
        &self,
        vote_id: Uuid,
    ) -> Result<EngagementOutcome, GroundswellError> {
        if vote_id.is_nil() {
            return Err(GroundswellError::MissingReference(
                "vote removal carries a nil reference".to_string(),
            ));
        }
        let vote = self.store.vote(vote_id).ok_or_else(|| {
            GroundswellError::MissingReference(format!("vote {vote_id} does not exist"))
        })?;

        let lane = self.store.petition_lane(vote.petition_id).await;

        // Re-read under the lane; a concurrent removal may have won.
        let vote = self.store.vote(vote_id).ok_or_else(|| {
            GroundswellError::MissingReference(format!("vote {vote_id} does not exist"))
        })?;
        if !vote.active {
            return Err(GroundswellError::Validation(format!(
                "vote {vote_id} is already removed"
            )));
        }

        let vigor_released: u64 = self
            .store
            .active_contributions_for_vote(vote_id)
            .iter()
            .map(|c| c.amount as u64)
            .sum();

        let totals = self.updater.release_vote(&vote);
        drop(lane);
        let degraded = totals.is_none();
        info!(%vote_id, petition_id = %vote.petition_id, vigor_released, "Vote removed");

        let notified = match totals {
            Some(totals) => self.evaluate_and_notify(&totals).await,
            None => false,
        };
        self.reconcile.enqueue(vote.petition_id);

        Ok(EngagementOutcome::VoteRemoved {
            vote_id,
            vigor_released,
            notified,
            degraded,
        })
    }

    async fn handle_vigor_contributed(
        &self,
        contribution_id: Uuid,
        vote_id: Uuid,
        user_id: Uuid,
        kind: &str,
        payload: serde_json::Value,
        statement: Option<String>,
    ) -> Result<EngagementOutcome, GroundswellError> {
        if contribution_id.is_nil() {
            return Err(GroundswellError::MissingReference(
                "contribution has no id".to_string(),
            ));
        }

        // Payload validation is a distinct pre-scoring step.
        let (parsed_kind, input) = scorer::validate(kind, &payload)?;
        let amount = scorer::score(&input);

        // Cheap peek to find the petition lane; the authoritative guard
        // check runs again under the lane.
        let peeked = guard::check_contribution(&self.store, vote_id, user_id)?;

        let lane = self.store.petition_lane(peeked.petition_id).await;
        let vote = guard::check_contribution(&self.store, vote_id, user_id)?;

        self.store.insert_contribution(VigorContribution {
            id: contribution_id,
            user_id,
            vote_id,
            petition_id: vote.petition_id,
            kind: parsed_kind,
            payload,
            amount,
            statement,
            active: true,
            created_at: chrono::Utc::now(),
        });

        let totals = self.updater.add_contribution(vote_id, vote.petition_id, amount);
        drop(lane);
        let degraded = totals.is_none();
        info!(
            %contribution_id,
            %vote_id,
            petition_id = %vote.petition_id,
            kind = %parsed_kind,
            amount,
            "Vigor contributed"
        );

        let notified = match totals {
            Some(totals) => self.evaluate_and_notify(&totals).await,
            None => false,
        };
        self.reconcile.enqueue(vote.petition_id);

        Ok(EngagementOutcome::VigorContributed {
            contribution_id,
            amount,
            notified,
            degraded,
        })
    }

    async fn handle_vigor_removed(
        &self,
        contribution_id: Uuid,
    ) -> Result<EngagementOutcome, GroundswellError> {
        if contribution_id.is_nil() {
            return Err(GroundswellError::MissingReference(
                "contribution removal carries a nil reference".to_string(),
            ));
        }
        let contribution = self.store.contribution(contribution_id).ok_or_else(|| {
            GroundswellError::MissingReference(format!(
                "contribution {contribution_id} does not exist"
            ))
        })?;

        let lane = self.store.petition_lane(contribution.petition_id).await;

        // Re-read under the lane.
        let contribution = self.store.contribution(contribution_id).ok_or_else(|| {
            GroundswellError::MissingReference(format!(
                "contribution {contribution_id} does not exist"
            ))
        })?;
        if !contribution.active {
            return Err(GroundswellError::Validation(format!(
                "contribution {contribution_id} is already removed"
            )));
        }

        self.store
            .update_contribution(contribution_id, |c| c.active = false);

        let totals = self.updater.remove_contribution(
            contribution.vote_id,
            contribution.petition_id,
            contribution.amount,
        );
        drop(lane);
        let degraded = totals.is_none();
        info!(
            %contribution_id,
            petition_id = %contribution.petition_id,
            amount = contribution.amount,
            "Vigor removed"
        );

        let notified = match totals {
            Some(totals) => self.evaluate_and_notify(&totals).await,
            None => false,
        };
        self.reconcile.enqueue(contribution.petition_id);

        Ok(EngagementOutcome::VigorRemoved {
            contribution_id,
            amount: contribution.amount,
            notified,
            degraded,
        })
    }

    /// Evaluate the trigger and hand any crossing to the sink. Sink
    /// failures degrade delivery, never the write.
    async fn evaluate_and_notify(&self, totals: &PetitionTotals) -> bool {
        let Some(crossing) = notify::evaluate(totals) else {
            return false;
        };
        info!(
            petition_id = %crossing.petition_id,
            effective_votes = crossing.effective_votes,
            reduced_threshold = crossing.reduced_threshold,
            "Petition crossed its notification threshold"
        );
        if let Err(e) = self.notifier.send(&crossing).await {
            warn!(
                petition_id = %crossing.petition_id,
                error = %e,
                "Notification sink failed; signal will be re-delivered on the next event"
            );
        }
        true
    }
}
