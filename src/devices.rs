//! Device details and the registry the dispatcher resolves devices against.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::capabilities::LockCapabilities;

/// Lock types whose hardware can unlatch when the backend reports no
/// capabilities.
const UNLATCH_LOCK_TYPES: &[u32] = &[17];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brand {
    August,
    YaleHome,
    YaleGlobal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeviceKind {
    Lock {
        lock_type: u32,
        #[serde(default)]
        serial_number: Option<String>,
        #[serde(default)]
        capabilities: Option<LockCapabilities>,
    },
    Doorbell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetail {
    pub device_id: String,
    pub device_name: String,
    pub house_id: String,
    #[serde(flatten)]
    pub kind: DeviceKind,
}

impl DeviceDetail {
    pub fn lock(device_id: &str, house_id: &str, lock_type: u32) -> Self {
        Self {
            device_id: device_id.to_string(),
            device_name: device_id.to_string(),
            house_id: house_id.to_string(),
            kind: DeviceKind::Lock {
                lock_type,
                serial_number: None,
                capabilities: None,
            },
        }
    }

    pub fn doorbell(device_id: &str, house_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            device_name: device_id.to_string(),
            house_id: house_id.to_string(),
            kind: DeviceKind::Doorbell,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.device_name = name.to_string();
        self
    }

    pub fn is_lock(&self) -> bool {
        matches!(self.kind, DeviceKind::Lock { .. })
    }

    /// Identifier the capabilities endpoint expects: the serial number when
    /// known, otherwise the device id.
    pub fn serial(&self) -> &str {
        match &self.kind {
            DeviceKind::Lock {
                serial_number: Some(serial),
                ..
            } => serial,
            _ => &self.device_id,
        }
    }

    /// Reported capabilities win over the lock-type table.
    pub fn unlatch_supported(&self) -> bool {
        match &self.kind {
            DeviceKind::Lock {
                lock_type,
                capabilities,
                ..
            } => capabilities
                .as_ref()
                .and_then(|c| c.unlatch)
                .unwrap_or_else(|| UNLATCH_LOCK_TYPES.contains(lock_type)),
            DeviceKind::Doorbell => false,
        }
    }

    pub fn set_capabilities(&mut self, caps: LockCapabilities) -> bool {
        match &mut self.kind {
            DeviceKind::Lock { capabilities, .. } => {
                *capabilities = Some(caps);
                true
            }
            DeviceKind::Doorbell => false,
        }
    }
}

/// Shared, read-mostly index of all known devices.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, DeviceDetail>>,
}

impl DeviceRegistry {
    pub fn new(devices: impl IntoIterator<Item = DeviceDetail>) -> Self {
        let devices = devices
            .into_iter()
            .map(|d| (d.device_id.clone(), d))
            .collect();
        Self {
            devices: RwLock::new(devices),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let devices: Vec<DeviceDetail> = serde_json::from_str(raw)?;
        Ok(Self::new(devices))
    }

    pub fn get(&self, device_id: &str) -> Option<DeviceDetail> {
        self.read().get(device_id).cloned()
    }

    /// Group key under which a device shares its refresh schedule.
    pub fn house_of(&self, device_id: &str) -> Option<String> {
        self.read().get(device_id).map(|d| d.house_id.clone())
    }

    pub fn house_ids(&self) -> BTreeSet<String> {
        self.read().values().map(|d| d.house_id.clone()).collect()
    }

    /// Lock ids in stable order.
    pub fn lock_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .read()
            .values()
            .filter(|d| d.is_lock())
            .map(|d| d.device_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn set_capabilities(&self, device_id: &str, caps: LockCapabilities) -> bool {
        let mut devices = self
            .devices
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        devices
            .get_mut(device_id)
            .map(|d| d.set_capabilities(caps))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, DeviceDetail>> {
        self.devices
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(unlatch: bool) -> LockCapabilities {
        LockCapabilities {
            unlatch: Some(unlatch),
            ..Default::default()
        }
    }

    #[test]
    fn unlatch_falls_back_to_lock_type() {
        assert!(DeviceDetail::lock("a", "h", 17).unlatch_supported());
        assert!(!DeviceDetail::lock("b", "h", 5).unlatch_supported());
    }

    #[test]
    fn capabilities_override_lock_type() {
        let mut enabled = DeviceDetail::lock("a", "h", 5);
        enabled.set_capabilities(caps(true));
        assert!(enabled.unlatch_supported());

        let mut disabled = DeviceDetail::lock("b", "h", 17);
        disabled.set_capabilities(caps(false));
        assert!(!disabled.unlatch_supported());
    }

    #[test]
    fn doorbells_never_take_capabilities() {
        let mut bell = DeviceDetail::doorbell("bell", "h");
        assert!(!bell.set_capabilities(caps(true)));
        assert!(!bell.unlatch_supported());
    }

    #[test]
    fn registry_resolves_houses_and_locks() {
        let registry = DeviceRegistry::new([
            DeviceDetail::lock("lock-b", "house-1", 5),
            DeviceDetail::lock("lock-a", "house-2", 5),
            DeviceDetail::doorbell("bell", "house-1"),
        ]);

        assert_eq!(registry.house_of("bell").as_deref(), Some("house-1"));
        assert_eq!(registry.house_of("missing"), None);
        assert_eq!(registry.house_ids().len(), 2);
        assert_eq!(registry.lock_ids(), vec!["lock-a", "lock-b"]);
    }

    #[test]
    fn registry_parses_json_devices() {
        let raw = r#"[
            {"device_id": "L1", "device_name": "Front Door", "house_id": "H",
             "kind": "lock", "lock_type": 17, "serial_number": "SERIAL1"},
            {"device_id": "D1", "device_name": "Bell", "house_id": "H", "kind": "doorbell"}
        ]"#;
        let registry = DeviceRegistry::from_json_str(raw).unwrap();

        let lock = registry.get("L1").unwrap();
        assert_eq!(lock.serial(), "SERIAL1");
        assert!(lock.unlatch_supported());
        assert!(!registry.get("D1").unwrap().is_lock());
    }
}
