//! Lock capability discovery.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::devices::{Brand, DeviceRegistry};
use crate::error::ApiError;
use crate::streaming::backend::DeviceApi;

/// HTTP statuses the backend uses for "this lock has no capability record".
const EXPECTED_MISSING_STATUSES: &[u16] = &[404, 409];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockCapabilities {
    #[serde(default)]
    pub unlatch: Option<bool>,
    #[serde(default)]
    pub door_sense: Option<bool>,
    #[serde(default)]
    pub battery_type: Option<String>,

    /// Everything else the backend reports, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    pub lock: LockCapabilities,
}

/// Fetches and stores capabilities for every lock, one at a time.
///
/// Failures are logged per lock and never abort the loop. Returns the number
/// of locks that received capabilities.
pub async fn fetch_lock_capabilities<A>(api: &A, registry: &DeviceRegistry, brand: Brand) -> usize
where
    A: DeviceApi + ?Sized,
{
    if brand == Brand::August {
        log::debug!("[CAPABILITIES] skipped for brand {:?}", brand);
        return 0;
    }

    let mut updated = 0;

    for lock_id in registry.lock_ids() {
        let Some(detail) = registry.get(&lock_id) else {
            continue;
        };

        match api.fetch_lock_capabilities(detail.serial()).await {
            Ok(response) => {
                if registry.set_capabilities(&lock_id, response.lock) {
                    updated += 1;
                }
            }
            Err(ApiError::Http { status, .. }) if EXPECTED_MISSING_STATUSES.contains(&status) => {
                log::debug!(
                    "[CAPABILITIES] Cannot fetch capabilities for lock {} (HTTP {})",
                    detail.device_name,
                    status
                );
            }
            Err(ApiError::Http { status, message }) => {
                log::warn!(
                    "[CAPABILITIES] Failed to fetch capabilities for lock {} (HTTP {}): {}",
                    detail.device_name,
                    status,
                    message
                );
            }
            Err(err) => {
                log::warn!(
                    "[CAPABILITIES] Failed to fetch capabilities for lock {}: {}",
                    detail.device_name,
                    err
                );
            }
        }
    }

    updated
}
