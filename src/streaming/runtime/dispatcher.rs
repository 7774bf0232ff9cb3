use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::devices::DeviceRegistry;
use crate::polling::RefreshScheduler;
use crate::streaming::backend::{DeviceObserver, HistorySink};
use crate::streaming::domain::ActivityExtractor;
use crate::streaming::engine::{PushClassification, PushStateTracker};
use crate::streaming::types::{PushMessage, PushSource};

/// Counters for everything the dispatcher has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub handled: usize,
    pub activities: usize,
    pub refreshes_requested: usize,
    pub refreshes_skipped: usize,
    pub unknown_devices: usize,
}

#[derive(Debug, Default)]
struct DispatcherState {
    tracker: PushStateTracker,
    stats: DispatchStats,
}

/// **PushMessageDispatcher**
///
/// Entry point for every push message. For each one it:
/// 1. Extracts activities and always hands them to the history sink.
/// 2. Classifies the message with the [`PushStateTracker`].
/// 3. Requests a refresh of the device's house only when actionable.
/// 4. Tells the observer the device changed.
pub struct PushMessageDispatcher {
    registry: Arc<DeviceRegistry>,
    extractor: Arc<dyn ActivityExtractor>,
    history: Arc<dyn HistorySink>,
    scheduler: RefreshScheduler,
    observer: Arc<dyn DeviceObserver>,
    state: Mutex<DispatcherState>,
}

impl PushMessageDispatcher {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        extractor: Arc<dyn ActivityExtractor>,
        history: Arc<dyn HistorySink>,
        scheduler: RefreshScheduler,
        observer: Arc<dyn DeviceObserver>,
    ) -> Self {
        Self {
            registry,
            extractor,
            history,
            scheduler,
            observer,
            state: Mutex::new(DispatcherState::default()),
        }
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> DispatchStats {
        self.lock().stats
    }

    /// Handles one push message. Returns `None` for devices the registry
    /// does not know.
    pub fn handle(
        &self,
        device_id: &str,
        observed_at: DateTime<Utc>,
        message: &PushMessage,
        source: PushSource,
    ) -> Option<PushClassification> {
        let Some(device) = self.registry.get(device_id) else {
            log::warn!("[DISPATCH] push for unknown device {} ignored", device_id);
            self.lock().stats.unknown_devices += 1;
            return None;
        };

        let activities = self
            .extractor
            .extract_activities(&device, observed_at, message, source);
        let newer = self.history.record_activities(device_id, &activities);
        log::trace!(
            "[DISPATCH] {}: {} activities recorded (newer: {})",
            device_id,
            activities.len(),
            newer
        );

        let classification = {
            let mut state = self.lock();
            let classification = state
                .tracker
                .classify(device_id, message, source, &activities);

            state.stats.handled += 1;
            state.stats.activities += activities.len();
            if classification.is_actionable() {
                state.stats.refreshes_requested += 1;
            } else {
                state.stats.refreshes_skipped += 1;
            }
            classification
        };

        match classification {
            PushClassification::Actionable => {
                if let Some(house_id) = self.registry.house_of(device_id) {
                    self.scheduler.request_refresh(&house_id);
                }
            }
            PushClassification::Unchanged => {
                log::debug!(
                    "[DISPATCH] Skipping unchanged push state for {} ({})",
                    device_id,
                    source
                );
            }
        }

        self.observer.notify_device_changed(device_id);
        Some(classification)
    }

    fn lock(&self) -> MutexGuard<'_, DispatcherState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
