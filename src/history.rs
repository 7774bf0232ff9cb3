//! In-memory activity history: the latest activity per device and category.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::streaming::backend::HistorySink;
use crate::streaming::domain::{Activity, ActivityCategory};

type HistoryKey = (String, ActivityCategory);

/// Splits a house-wide activity list into per-device batches, ordered by
/// device id. Order within a batch is preserved.
pub fn group_by_device(activities: &[Activity]) -> BTreeMap<&str, Vec<Activity>> {
    let mut by_device: BTreeMap<&str, Vec<Activity>> = BTreeMap::new();
    for activity in activities {
        by_device
            .entry(activity.device_id.as_str())
            .or_default()
            .push(activity.clone());
    }
    by_device
}

#[derive(Debug, Default)]
pub struct ActivityHistory {
    latest: Mutex<HashMap<HistoryKey, Activity>>,
}

impl ActivityHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, device_id: &str, category: ActivityCategory) -> Option<Activity> {
        self.guard()
            .get(&(device_id.to_string(), category))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<HistoryKey, Activity>> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HistorySink for ActivityHistory {
    fn record_activities(&self, device_id: &str, activities: &[Activity]) -> bool {
        let mut latest = self.guard();
        let mut updated = false;

        for activity in activities {
            let key = (device_id.to_string(), activity.category());
            let newer = latest
                .get(&key)
                .map_or(true, |current| activity.activity_time > current.activity_time);

            if newer {
                log::trace!("[HISTORY] {} is newer for {:?}", activity, key.1);
                latest.insert(key, activity.clone());
                updated = true;
            }
        }

        updated
    }
}
