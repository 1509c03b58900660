pub mod aggregates;
pub mod engine;
pub mod guard;
pub mod notify;
pub mod scorer;

pub use aggregates::{AggregateUpdater, PetitionTotals};
pub use engine::{EngagementEngine, EngagementOutcome};
pub use notify::{NoopSink, NotificationSink};
