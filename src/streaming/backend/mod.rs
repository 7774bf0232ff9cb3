pub mod api;
pub mod mock;

pub use api::{ActivityFetcher, DeviceApi, DeviceObserver, HistorySink};
pub use mock::{RecordingDeviceApi, RecordingHistory, RecordingObserver};
