//! External engagement events — facts produced by the (out-of-scope)
//! CRUD layer and consumed by the engine.
//!
//! The `type` tag doubles as the event type string; activity payloads
//! stay as raw `serde_json::Value` until the scorer's validation step
//! gives them a shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngagementEvent {
    VoteCreated {
        vote_id: Uuid,
        user_id: Uuid,
        petition_id: Uuid,
        statement: Option<String>,
    },

    VoteRemoved {
        vote_id: Uuid,
    },

    VigorContributed {
        contribution_id: Uuid,
        vote_id: Uuid,
        user_id: Uuid,
        kind: String,
        payload: serde_json::Value,
        statement: Option<String>,
    },

    VigorRemoved {
        contribution_id: Uuid,
    },
}

impl EngagementEvent {
    /// The event type string, matching the serde tag.
    pub fn event_type_str(&self) -> &'static str {
        match self {
            EngagementEvent::VoteCreated { .. } => "vote_created",
            EngagementEvent::VoteRemoved { .. } => "vote_removed",
            EngagementEvent::VigorContributed { .. } => "vigor_contributed",
            EngagementEvent::VigorRemoved { .. } => "vigor_removed",
        }
    }

    /// Deserialize an event from a raw JSON payload.
    pub fn from_payload(payload: &serde_json::Value) -> anyhow::Result<Self> {
        Ok(serde_json::from_value(payload.clone())?)
    }

    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("EngagementEvent serialization should never fail")
    }
}
