use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::capabilities::CapabilitiesResponse;
use crate::error::ApiError;
use crate::streaming::backend::api::{ActivityFetcher, DeviceApi, DeviceObserver, HistorySink};
use crate::streaming::domain::{Activity, ActivityType};
use crate::streaming::types::PushSource;

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Pure in-memory backend that records every call.
///
/// Used by the tests and by the replay binary.
#[derive(Debug, Default)]
pub struct RecordingDeviceApi {
    house_activities: Mutex<HashMap<String, Vec<Activity>>>,
    capabilities: Mutex<HashMap<String, Result<CapabilitiesResponse, ApiError>>>,
    fetch_calls: Mutex<Vec<String>>,
    capability_calls: Mutex<Vec<String>>,
    operations: Mutex<Vec<String>>,
    failing_fetches: AtomicUsize,
    fetch_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    overlapped: AtomicBool,
}

impl RecordingDeviceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_house_activities(self, house_id: &str, activities: Vec<Activity>) -> Self {
        guard(&self.house_activities).insert(house_id.to_string(), activities);
        self
    }

    pub fn with_capabilities(
        self,
        serial: &str,
        response: Result<CapabilitiesResponse, ApiError>,
    ) -> Self {
        guard(&self.capabilities).insert(serial.to_string(), response);
        self
    }

    /// Each fetch sleeps this long before answering.
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *guard(&self.fetch_delay) = Some(delay);
        self
    }

    /// The next `n` fetches fail with a network error.
    pub fn fail_next_fetches(&self, n: usize) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        guard(&self.fetch_calls).len()
    }

    pub fn fetch_calls(&self) -> Vec<String> {
        guard(&self.fetch_calls).clone()
    }

    pub fn capability_calls(&self) -> Vec<String> {
        guard(&self.capability_calls).clone()
    }

    pub fn operations(&self) -> Vec<String> {
        guard(&self.operations).clone()
    }

    /// True if two fetches were ever in flight at the same time.
    pub fn saw_overlapping_fetches(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    fn record_op(&self, op: String) {
        log::debug!("[MOCK] {}", op);
        guard(&self.operations).push(op);
    }

    fn operation_activity(device_id: &str, action: &str) -> Vec<Activity> {
        vec![Activity::new(
            device_id,
            ActivityType::LockOperation,
            action,
            Utc::now(),
            PushSource::Confirmed,
        )]
    }
}

#[async_trait]
impl ActivityFetcher for RecordingDeviceApi {
    async fn fetch_house_activities(&self, house_id: &str) -> Result<Vec<Activity>, ApiError> {
        guard(&self.fetch_calls).push(house_id.to_string());

        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let delay = *guard(&self.fetch_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failing = self
            .failing_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ApiError::Network("simulated network error".to_string()));
        }

        Ok(guard(&self.house_activities)
            .get(house_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl DeviceApi for RecordingDeviceApi {
    async fn fetch_lock_capabilities(&self, serial: &str) -> Result<CapabilitiesResponse, ApiError> {
        guard(&self.capability_calls).push(serial.to_string());
        guard(&self.capabilities)
            .get(serial)
            .cloned()
            .unwrap_or_else(|| {
                Err(ApiError::Http {
                    status: 404,
                    message: "Device info not found".to_string(),
                })
            })
    }

    async fn lock(&self, device_id: &str) -> Result<Vec<Activity>, ApiError> {
        self.record_op(format!("lock({device_id})"));
        Ok(Self::operation_activity(device_id, "lock"))
    }

    async fn unlock(&self, device_id: &str) -> Result<Vec<Activity>, ApiError> {
        self.record_op(format!("unlock({device_id})"));
        Ok(Self::operation_activity(device_id, "unlock"))
    }

    async fn unlatch(&self, device_id: &str) -> Result<Vec<Activity>, ApiError> {
        self.record_op(format!("unlatch({device_id})"));
        Ok(Self::operation_activity(device_id, "unlatch"))
    }

    async fn lock_async(&self, device_id: &str, hyper_bridge: bool) -> Result<String, ApiError> {
        self.record_op(format!("lock_async({device_id}, {hyper_bridge})"));
        Ok(format!("lock-request-{device_id}"))
    }

    async fn unlock_async(&self, device_id: &str, hyper_bridge: bool) -> Result<String, ApiError> {
        self.record_op(format!("unlock_async({device_id}, {hyper_bridge})"));
        Ok(format!("unlock-request-{device_id}"))
    }

    async fn unlatch_async(&self, device_id: &str, hyper_bridge: bool) -> Result<String, ApiError> {
        self.record_op(format!("unlatch_async({device_id}, {hyper_bridge})"));
        Ok(format!("unlatch-request-{device_id}"))
    }
}

/// History sink that remembers every batch it was handed.
#[derive(Debug, Default)]
pub struct RecordingHistory {
    batches: Mutex<Vec<(String, Vec<Activity>)>>,
    reports_newer: AtomicBool,
}

impl RecordingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value returned from `record_activities`.
    pub fn reporting_newer(self, newer: bool) -> Self {
        self.reports_newer.store(newer, Ordering::SeqCst);
        self
    }

    pub fn batches(&self) -> Vec<(String, Vec<Activity>)> {
        guard(&self.batches).clone()
    }
}

impl HistorySink for RecordingHistory {
    fn record_activities(&self, device_id: &str, activities: &[Activity]) -> bool {
        guard(&self.batches).push((device_id.to_string(), activities.to_vec()));
        self.reports_newer.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    notified: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified(&self) -> Vec<String> {
        guard(&self.notified).clone()
    }
}

impl DeviceObserver for RecordingObserver {
    fn notify_device_changed(&self, device_id: &str) {
        guard(&self.notified).push(device_id.to_string());
    }
}
