use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw push payload as delivered by the transport.
pub type PushMessage = Map<String, Value>;

/// Channel a push message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushSource {
    /// Passive status snapshots; may be stale or unsolicited.
    Snapshot,
    /// Streaming channel that only carries confirmed state changes.
    Confirmed,
}

impl PushSource {
    /// Message key holding the lock state for this source.
    pub fn lock_key(self) -> &'static str {
        match self {
            PushSource::Snapshot => "status",
            PushSource::Confirmed => "lockAction",
        }
    }

    /// Message key holding the door state for this source.
    pub fn door_key(self) -> &'static str {
        "doorState"
    }
}

impl fmt::Display for PushSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushSource::Snapshot => f.write_str("snapshot"),
            PushSource::Confirmed => f.write_str("confirmed"),
        }
    }
}

/// One inbound push notification, as handed over by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub device_id: String,
    pub observed_at: DateTime<Utc>,
    pub message: PushMessage,
    pub source: PushSource,
}
