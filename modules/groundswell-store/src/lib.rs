pub mod store;

pub use store::EngagementStore;
