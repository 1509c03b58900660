use std::env;
use std::time::Duration;

/// Subsystem configuration loaded from environment variables.
/// Every knob has a default so library and test callers can use
/// `Config::default()` without touching the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cumulative vigor at which a petition's notification threshold
    /// bottoms out at 50% of its base value.
    pub vigor_saturation: u64,

    /// Bound on a single petition's reconciliation pass.
    pub reconcile_timeout: Duration,

    /// Base notification threshold for petitions seeded without one.
    pub default_notification_threshold: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            vigor_saturation: env::var("VIGOR_SATURATION")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .expect("VIGOR_SATURATION must be a number"),
            reconcile_timeout: Duration::from_millis(
                env::var("RECONCILE_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .expect("RECONCILE_TIMEOUT_MS must be a number"),
            ),
            default_notification_threshold: env::var("DEFAULT_NOTIFICATION_THRESHOLD")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .expect("DEFAULT_NOTIFICATION_THRESHOLD must be a number"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vigor_saturation: 10_000,
            reconcile_timeout: Duration::from_millis(5_000),
            default_notification_threshold: 1_000,
        }
    }
}
