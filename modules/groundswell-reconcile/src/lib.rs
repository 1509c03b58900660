pub mod queue;
pub mod recompute;

pub use queue::{MetricsReconciler, ReconcileHandle, ReconcilerStats};
pub use recompute::reconcile_petition;
