use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// --- Contribution Kinds ---

/// The fixed set of activity kinds a vigor contribution can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    PhysicalActivity,
    VoiceRecording,
    WrittenStatement,
    CommunityOutreach,
}

impl ContributionKind {
    /// Parse the kind string carried by external events.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "physical_activity" => Some(ContributionKind::PhysicalActivity),
            "voice_recording" => Some(ContributionKind::VoiceRecording),
            "written_statement" => Some(ContributionKind::WrittenStatement),
            "community_outreach" => Some(ContributionKind::CommunityOutreach),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContributionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContributionKind::PhysicalActivity => write!(f, "physical_activity"),
            ContributionKind::VoiceRecording => write!(f, "voice_recording"),
            ContributionKind::WrittenStatement => write!(f, "written_statement"),
            ContributionKind::CommunityOutreach => write!(f, "community_outreach"),
        }
    }
}

// --- Petitions ---

/// Aggregate root. Live counters are maintained by the aggregate updater;
/// `reduced_threshold` is derived and recomputed on every vigor change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Petition {
    pub id: Uuid,
    pub title: String,
    pub total_vigor: u64,
    pub notification_threshold: u32,
    pub reduced_threshold: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Seed for registering a new petition.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PetitionSeed {
    #[builder(setter(into))]
    pub title: String,
    pub notification_threshold: u32,
}

// --- Votes ---

/// A single user's support for a petition. Unique per (user, petition)
/// among active votes. Soft-deactivated, never deleted while vigor
/// history references it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub petition_id: Uuid,
    pub statement: Option<String>,
    pub total_vigor: u64,
    pub vigor_count: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// --- Vigor Contributions ---

/// A bounded effort score attached to a vote. `petition_id` is
/// denormalized from the owning vote. `amount` is fixed at creation by
/// the scorer and subtracted (not recomputed) on removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VigorContribution {
    pub id: Uuid,
    pub user_id: Uuid,
    pub vote_id: Uuid,
    pub petition_id: Uuid,
    pub kind: ContributionKind,
    pub payload: serde_json::Value,
    pub amount: u32,
    pub statement: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// --- Metrics Snapshots ---

/// Eventually-consistent read model, one per petition. Written only by
/// the reconciler, always recomputed from source records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetitionMetricsSnapshot {
    pub petition_id: Uuid,
    pub vote_count: u32,
    pub vigor_count: u32,
    pub total_vigor: u64,
    pub trending_score: f64,
    pub updated_at: DateTime<Utc>,
}

/// Numeric snapshot fields the leaderboard can sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotField {
    VoteCount,
    VigorCount,
    TotalVigor,
    TrendingScore,
}

// --- Notification Signals ---

/// Emitted when a petition's effective votes cross its reduced threshold.
/// Delivery is at-least-once; the evaluator itself is pure and idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdCrossing {
    pub petition_id: Uuid,
    pub vote_count: u32,
    pub total_vigor: u64,
    pub effective_votes: u64,
    pub reduced_threshold: u32,
}
