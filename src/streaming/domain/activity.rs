use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::streaming::types::PushSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    LockOperation,
    LockOperationWithoutOperator,
    DoorOperation,
    BridgeOperation,
    DoorbellDing,
    DoorbellMotion,
    DoorbellImageCapture,
}

/// History bucket: only the latest activity per category is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActivityCategory {
    Lock,
    Door,
    Bridge,
    Doorbell,
}

impl ActivityType {
    pub fn category(self) -> ActivityCategory {
        match self {
            ActivityType::LockOperation | ActivityType::LockOperationWithoutOperator => {
                ActivityCategory::Lock
            }
            ActivityType::DoorOperation => ActivityCategory::Door,
            ActivityType::BridgeOperation => ActivityCategory::Bridge,
            ActivityType::DoorbellDing
            | ActivityType::DoorbellMotion
            | ActivityType::DoorbellImageCapture => ActivityCategory::Doorbell,
        }
    }
}

/// A single device event, either parsed from a push message or returned by
/// the backend's activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub device_id: String,
    pub activity_type: ActivityType,
    pub action: String,
    pub activity_time: DateTime<Utc>,
    pub source: PushSource,

    /// Passive observation rather than a confirmed action.
    #[serde(default)]
    pub is_status: bool,

    #[serde(default)]
    pub operated_by: Option<String>,

    #[serde(default)]
    pub operated_manual: bool,

    #[serde(default)]
    pub image_url: Option<String>,
}

impl Activity {
    pub fn new(
        device_id: &str,
        activity_type: ActivityType,
        action: &str,
        activity_time: DateTime<Utc>,
        source: PushSource,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            activity_type,
            action: action.to_string(),
            activity_time,
            source,
            is_status: false,
            operated_by: None,
            operated_manual: false,
            image_url: None,
        }
    }

    pub fn as_status(mut self, is_status: bool) -> Self {
        self.is_status = is_status;
        self
    }

    pub fn category(&self) -> ActivityCategory {
        self.activity_type.category()
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}(device={}, action={}, at={}, source={})",
            self.activity_type, self.device_id, self.action, self.activity_time, self.source
        )
    }
}
