pub mod types;
pub mod events;
pub mod config;
pub mod error;

pub use types::*;
pub use events::EngagementEvent;
pub use config::Config;
pub use error::GroundswellError;
