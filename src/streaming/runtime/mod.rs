//! Imperative shell around the push state engine.
//!
//! The dispatcher owns the side effects (history, refresh scheduling,
//! observers); the driver feeds it from the transport channel.

pub mod dispatcher;
pub mod driver;
pub mod observer;


pub use dispatcher::{DispatchStats, PushMessageDispatcher};
pub use driver::PushDriver;
pub use observer::BroadcastObserver;
