//! Push payload → typed activities.
//!
//! Pure functions only. The dispatcher calls through [`ActivityExtractor`]
//! so tests can substitute canned activities.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::devices::{DeviceDetail, DeviceKind};
use crate::streaming::domain::activity::{Activity, ActivityType};
use crate::streaming::types::{PushMessage, PushSource};

const MANUAL_OPERATORS: &[&str] = &["manuallock", "manualunlock", "manualunlatch"];
const BRIDGE_OFFLINE_ERROR: &str = "ERRNO_BRIDGE_OFFLINE";

/// Turns one push message into zero or more activities.
pub trait ActivityExtractor: Send + Sync {
    fn extract_activities(
        &self,
        device: &DeviceDetail,
        observed_at: DateTime<Utc>,
        message: &PushMessage,
        source: PushSource,
    ) -> Vec<Activity>;
}

/// Default extractor for lock and doorbell push payloads.
#[derive(Debug, Clone, Default)]
pub struct PushActivityParser {
    /// user id -> display name
    user_names: HashMap<String, String>,
}

impl PushActivityParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_name(mut self, user_id: &str, name: &str) -> Self {
        self.user_names.insert(user_id.to_string(), name.to_string());
        self
    }

    fn lock_activities(
        &self,
        device: &DeviceDetail,
        observed_at: DateTime<Utc>,
        message: &PushMessage,
        source: PushSource,
    ) -> Vec<Activity> {
        let status = str_field(message, "status").or_else(|| match source {
            PushSource::Confirmed => str_field(message, "lockAction"),
            PushSource::Snapshot => None,
        });
        let info = message.get("info").and_then(Value::as_object);

        if bridge_reported_offline(message) {
            return vec![Activity::new(
                &device.device_id,
                ActivityType::BridgeOperation,
                "associated_bridge_offline",
                observed_at,
                source,
            )];
        }

        if let Some(s @ ("associated_bridge_offline" | "associated_bridge_online")) = status {
            return vec![Activity::new(
                &device.device_id,
                ActivityType::BridgeOperation,
                s,
                observed_at,
                source,
            )];
        }

        // Bridge status polls repeat what we already know.
        if info.and_then(|i| i.get("action")).and_then(Value::as_str) == Some("status") {
            return Vec::new();
        }

        let calling_user = str_field(message, "callingUserID");
        let operated_manual = calling_user.is_some_and(|u| MANUAL_OPERATORS.contains(&u));
        let operated_by = calling_user
            .filter(|_| !operated_manual)
            .and_then(|u| self.user_names.get(u))
            .cloned();
        let is_status = source == PushSource::Snapshot && info.is_none() && calling_user.is_none();
        let activity_time = info
            .and_then(|i| i.get("startTime"))
            .and_then(Value::as_str)
            .and_then(parse_time)
            .unwrap_or(observed_at);

        let mut activities = Vec::new();

        if let Some(action) = status.and_then(lock_action) {
            let activity_type = if operated_by.is_some() {
                ActivityType::LockOperation
            } else {
                ActivityType::LockOperationWithoutOperator
            };
            let mut activity = Activity::new(
                &device.device_id,
                activity_type,
                action,
                activity_time,
                source,
            )
            .as_status(is_status);
            activity.operated_by = operated_by;
            activity.operated_manual = operated_manual;
            activities.push(activity);
        }

        if let Some(action) = str_field(message, "doorState").and_then(door_action) {
            let mut activity = Activity::new(
                &device.device_id,
                ActivityType::DoorOperation,
                action,
                activity_time,
                source,
            )
            .as_status(is_status);
            activity.operated_manual = operated_manual;
            activities.push(activity);
        }

        activities
    }

    fn doorbell_activities(
        &self,
        device: &DeviceDetail,
        observed_at: DateTime<Utc>,
        message: &PushMessage,
        source: PushSource,
    ) -> Vec<Activity> {
        let data = message.get("data");
        let (activity_type, image) = match str_field(message, "status") {
            Some("buttonpush") => (ActivityType::DoorbellDing, None),
            Some("doorbell_motion_detected") => (
                ActivityType::DoorbellMotion,
                data.and_then(|d| d.get("image")),
            ),
            Some("imagecapture") => (
                ActivityType::DoorbellImageCapture,
                data.and_then(|d| d.get("result")),
            ),
            _ => return Vec::new(),
        };

        let action = str_field(message, "status").unwrap_or_default();
        let activity_time = image
            .and_then(|i| i.get("created_at"))
            .and_then(Value::as_str)
            .and_then(parse_time)
            .unwrap_or(observed_at);

        let mut activity = Activity::new(
            &device.device_id,
            activity_type,
            action,
            activity_time,
            source,
        );
        activity.image_url = image
            .and_then(|i| i.get("secure_url"))
            .and_then(Value::as_str)
            .map(str::to_string);

        vec![activity]
    }
}

impl ActivityExtractor for PushActivityParser {
    fn extract_activities(
        &self,
        device: &DeviceDetail,
        observed_at: DateTime<Utc>,
        message: &PushMessage,
        source: PushSource,
    ) -> Vec<Activity> {
        let activities = match device.kind {
            DeviceKind::Lock { .. } => self.lock_activities(device, observed_at, message, source),
            DeviceKind::Doorbell => self.doorbell_activities(device, observed_at, message, source),
        };
        log::trace!(
            "[PARSER] {} -> {} activities from {} message",
            device.device_id,
            activities.len(),
            source
        );
        activities
    }
}

fn str_field<'a>(message: &'a PushMessage, key: &str) -> Option<&'a str> {
    message.get(key).and_then(Value::as_str)
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn bridge_reported_offline(message: &PushMessage) -> bool {
    message
        .get("error")
        .and_then(|e| e.get("name"))
        .and_then(Value::as_str)
        == Some(BRIDGE_OFFLINE_ERROR)
}

fn lock_action(status: &str) -> Option<&'static str> {
    match status {
        "kAugLockState_Locked" | "locked" => Some("lock"),
        "kAugLockState_Unlocked" | "unlocked" => Some("unlock"),
        "kAugLockState_Unlatched" | "unlatched" => Some("unlatch"),
        "kAugLockState_Locking" | "locking" => Some("locking"),
        "kAugLockState_Unlocking" | "unlocking" => Some("unlocking"),
        "kAugLockState_Unlatching" | "unlatching" => Some("unlatching"),
        "kAugLockState_Jammed" | "jammed" | "FAILED_BRIDGE_ERROR_LOCK_JAMMED" => Some("jammed"),
        _ => None,
    }
}

fn door_action(state: &str) -> Option<&'static str> {
    match state {
        "closed" | "kAugDoorState_Closed" => Some("doorclosed"),
        "open" | "kAugDoorState_Open" => Some("dooropen"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lock() -> DeviceDetail {
        DeviceDetail::lock("A6697750D607098BAE8D6BAA11EF8063", "house", 5)
    }

    fn msg(v: Value) -> PushMessage {
        v.as_object().cloned().unwrap()
    }

    fn at() -> DateTime<Utc> {
        parse_time("2017-12-10T05:48:30.272Z").unwrap()
    }

    fn extract(device: &DeviceDetail, v: Value, source: PushSource) -> Vec<Activity> {
        PushActivityParser::new().extract_activities(device, at(), &msg(v), source)
    }

    #[test]
    fn transitional_lock_states_map_to_actions() {
        for (status, action) in [
            ("kAugLockState_Unlatching", "unlatching"),
            ("kAugLockState_Unlocking", "unlocking"),
            ("kAugLockState_Locking", "locking"),
            ("FAILED_BRIDGE_ERROR_LOCK_JAMMED", "jammed"),
            ("kAugLockState_Unlocked", "unlock"),
        ] {
            let activities = extract(
                &lock(),
                json!({
                    "remoteEvent": 1,
                    "status": status,
                    "info": {"action": "unlock", "startTime": "2021-03-20T18:19:06.374Z"}
                }),
                PushSource::Snapshot,
            );
            assert_eq!(activities[0].action, action, "status {status}");
            assert_eq!(
                activities[0].activity_time,
                parse_time("2021-03-20T18:19:06.374Z").unwrap()
            );
        }
    }

    #[test]
    fn lock_and_door_state_yield_two_activities() {
        let activities = extract(
            &lock(),
            json!({
                "status": "locked",
                "callingUserID": "8918341e-7e68-4079-ad0a-1fa8a45d855b",
                "doorState": "open"
            }),
            PushSource::Snapshot,
        );

        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].action, "lock");
        assert_eq!(
            activities[0].activity_type,
            ActivityType::LockOperationWithoutOperator
        );
        assert_eq!(activities[0].operated_by, None);
        assert_eq!(activities[1].activity_type, ActivityType::DoorOperation);
        assert_eq!(activities[1].action, "dooropen");
    }

    #[test]
    fn known_user_is_resolved_to_operator() {
        let parser = PushActivityParser::new()
            .with_user_name("5309b78d-de0c-4ec5-b878-02784c3b598a", "bob smith");
        let activities = parser.extract_activities(
            &lock(),
            at(),
            &msg(json!({
                "status": "unlocked",
                "callingUserID": "5309b78d-de0c-4ec5-b878-02784c3b598a",
                "doorState": "closed",
                "info": {"action": "unlock", "startTime": "2017-12-10T05:48:30.272Z"}
            })),
            PushSource::Snapshot,
        );

        assert_eq!(activities[0].action, "unlock");
        assert_eq!(activities[0].activity_type, ActivityType::LockOperation);
        assert_eq!(activities[0].operated_by.as_deref(), Some("bob smith"));
    }

    #[test]
    fn manual_operation_is_not_status() {
        let activities = extract(
            &lock(),
            json!({"status": "unlatched", "callingUserID": "manualunlatch", "doorState": "open"}),
            PushSource::Snapshot,
        );

        assert_eq!(activities[0].action, "unlatch");
        assert!(activities[0].operated_manual);
        assert!(!activities[0].is_status);
        assert!(!activities[1].is_status);
        assert_eq!(activities[0].operated_by, None);
    }

    #[test]
    fn bare_snapshot_is_status_but_confirmed_is_not() {
        let snapshot = extract(
            &lock(),
            json!({"status": "kAugLockState_Locked"}),
            PushSource::Snapshot,
        );
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].is_status);
        assert_eq!(snapshot[0].source, PushSource::Snapshot);

        let confirmed = extract(
            &lock(),
            json!({"status": "kAugLockState_Locked"}),
            PushSource::Confirmed,
        );
        assert_eq!(confirmed.len(), 1);
        assert!(!confirmed[0].is_status);
        assert_eq!(confirmed[0].source, PushSource::Confirmed);
    }

    #[test]
    fn confirmed_source_reads_lock_action_key() {
        let activities = extract(
            &lock(),
            json!({"lockAction": "unlocked", "doorState": "closed"}),
            PushSource::Confirmed,
        );

        assert_eq!(activities[0].action, "unlock");
        assert_eq!(activities[1].action, "doorclosed");
    }

    #[test]
    fn status_polls_produce_nothing() {
        let activities = extract(
            &lock(),
            json!({
                "remoteEvent": 1,
                "status": "kAugLockState_Locked",
                "info": {"action": "status", "startTime": "2024-02-15T07:33:50.804Z"},
                "doorState": "kAugDoorState_Closed"
            }),
            PushSource::Snapshot,
        );

        assert!(activities.is_empty());
    }

    #[test]
    fn door_state_changed_and_init_produce_nothing() {
        assert!(extract(
            &lock(),
            json!({"status": "DoorStateChanged", "lockID": "xxx"}),
            PushSource::Snapshot
        )
        .is_empty());
        assert!(extract(
            &lock(),
            json!({"doorState": "init", "lockID": "xxx"}),
            PushSource::Snapshot
        )
        .is_empty());
    }

    #[test]
    fn bridge_status_and_error_payloads() {
        let online = extract(
            &lock(),
            json!({"status": "associated_bridge_online"}),
            PushSource::Snapshot,
        );
        assert_eq!(online[0].activity_type, ActivityType::BridgeOperation);
        assert_eq!(online[0].action, "associated_bridge_online");

        let offline = extract(
            &lock(),
            json!({
                "remoteEvent": 1,
                "status": "unknown",
                "result": "failed",
                "error": {"name": "ERRNO_BRIDGE_OFFLINE", "statusCode": 422},
                "info": {"action": "status"}
            }),
            PushSource::Snapshot,
        );
        assert_eq!(offline[0].activity_type, ActivityType::BridgeOperation);
        assert_eq!(offline[0].action, "associated_bridge_offline");
    }

    #[test]
    fn doorbell_events_carry_images() {
        let bell = DeviceDetail::doorbell("K98GiDT45GUL", "house");

        let capture = extract(
            &bell,
            json!({
                "status": "imagecapture",
                "data": {"result": {
                    "created_at": "2021-03-16T01:07:08.817Z",
                    "secure_url": "https://images.example/zip.jpeg"
                }}
            }),
            PushSource::Snapshot,
        );
        assert_eq!(capture[0].activity_type, ActivityType::DoorbellImageCapture);
        assert_eq!(
            capture[0].image_url.as_deref(),
            Some("https://images.example/zip.jpeg")
        );
        assert_eq!(
            capture[0].activity_time,
            parse_time("2021-03-16T01:07:08.817Z").unwrap()
        );

        let motion = extract(
            &bell,
            json!({
                "status": "doorbell_motion_detected",
                "data": {"image": {
                    "created_at": "2021-03-16T02:36:26.886Z",
                    "secure_url": "https://images.example/1f8.jpeg"
                }}
            }),
            PushSource::Snapshot,
        );
        assert_eq!(motion[0].activity_type, ActivityType::DoorbellMotion);
        assert_eq!(
            motion[0].image_url.as_deref(),
            Some("https://images.example/1f8.jpeg")
        );

        let ding = extract(&bell, json!({"status": "buttonpush"}), PushSource::Snapshot);
        assert_eq!(ding[0].activity_type, ActivityType::DoorbellDing);
        assert_eq!(ding[0].activity_time, at());
    }
}
