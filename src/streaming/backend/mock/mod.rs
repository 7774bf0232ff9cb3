mod client;

pub use client::{RecordingDeviceApi, RecordingHistory, RecordingObserver};
