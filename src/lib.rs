pub mod capabilities;
pub mod config;
pub mod devices;
pub mod error;
pub mod history;
pub mod operations;
pub mod polling;
pub mod streaming;

pub use config::SyncConfig;
pub use polling::RefreshScheduler;
pub use streaming::engine::{PushClassification, PushStateTracker};
pub use streaming::runtime::PushMessageDispatcher;
