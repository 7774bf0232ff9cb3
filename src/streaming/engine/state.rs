use std::collections::HashMap;

use serde_json::Value;

use crate::streaming::types::{PushMessage, PushSource};

/// Last observed `{lock, door}` tokens for one (device, source) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushState {
    pub lock: Option<String>,
    pub door: Option<String>,
}

impl PushState {
    pub fn new(lock: &str, door: &str) -> Self {
        Self {
            lock: Some(lock.to_string()),
            door: Some(door.to_string()),
        }
    }

    /// Reads the source-specific keys; missing or null keys stay absent.
    pub fn from_message(message: &PushMessage, source: PushSource) -> Self {
        Self {
            lock: token(message, source.lock_key()),
            door: token(message, source.door_key()),
        }
    }

    /// True when no field present on both sides disagrees.
    pub fn matches(&self, incoming: &PushState) -> bool {
        field_matches(&self.lock, &incoming.lock) && field_matches(&self.door, &incoming.door)
    }

    /// True when every field the incoming state carries is already tracked
    /// with the same value. A field the baseline has never seen is a change.
    pub fn covers(&self, incoming: &PushState) -> bool {
        field_covers(&self.lock, &incoming.lock) && field_covers(&self.door, &incoming.door)
    }

    /// Overwrites every field the incoming state carries.
    pub fn absorb(&mut self, incoming: PushState) {
        if incoming.lock.is_some() {
            self.lock = incoming.lock;
        }
        if incoming.door.is_some() {
            self.door = incoming.door;
        }
    }
}

fn field_matches(tracked: &Option<String>, incoming: &Option<String>) -> bool {
    match (tracked, incoming) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn field_covers(tracked: &Option<String>, incoming: &Option<String>) -> bool {
    match (tracked, incoming) {
        (_, None) => true,
        (Some(a), Some(b)) => a == b,
        (None, Some(_)) => false,
    }
}

fn token(message: &PushMessage, key: &str) -> Option<String> {
    match message.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub type StateKey = (String, PushSource);

#[derive(Debug, Default)]
pub struct TrackerState {
    /// (device id, source) -> baseline. Entries are never removed.
    pub baselines: HashMap<StateKey, PushState>,
}
