//! Referential integrity guard.
//!
//! Runs synchronously before a vigor contribution is admitted. The rest
//! of the subsystem assumes `contribution.user_id == vote.user_id` holds
//! by construction and never re-verifies it on reads.

use uuid::Uuid;

use groundswell_common::{GroundswellError, Vote};
use groundswell_store::EngagementStore;

/// Confirm the vote exists, is active, and is owned by the declared
/// contributor. Returns the owning vote on success so the caller can
/// pick up its petition without a second lookup.
pub fn check_contribution(
    store: &EngagementStore,
    vote_id: Uuid,
    user_id: Uuid,
) -> Result<Vote, GroundswellError> {
    if vote_id.is_nil() {
        return Err(GroundswellError::MissingReference(
            "contribution has no vote reference".to_string(),
        ));
    }
    if user_id.is_nil() {
        return Err(GroundswellError::MissingReference(
            "contribution has no owner reference".to_string(),
        ));
    }

    let vote = store.vote(vote_id).ok_or_else(|| {
        GroundswellError::ReferentialMismatch(format!("vote {vote_id} does not exist"))
    })?;
    if !vote.active {
        return Err(GroundswellError::ReferentialMismatch(format!(
            "vote {vote_id} is no longer active"
        )));
    }
    if vote.user_id != user_id {
        return Err(GroundswellError::ReferentialMismatch(format!(
            "contribution owner {user_id} does not match vote owner {}",
            vote.user_id
        )));
    }

    Ok(vote)
}
