use async_trait::async_trait;

use crate::capabilities::CapabilitiesResponse;
use crate::error::ApiError;
use crate::streaming::domain::Activity;

/// The one backend call the refresh scheduler needs.
#[async_trait]
pub trait ActivityFetcher: Send + Sync {
    /// Full, authoritative activity list for a house.
    async fn fetch_house_activities(&self, house_id: &str) -> Result<Vec<Activity>, ApiError>;
}

/// Remaining backend surface: capabilities and lock commands.
///
/// Authentication and retries are the implementor's business; callers only
/// see success or an [`ApiError`].
#[async_trait]
pub trait DeviceApi: ActivityFetcher {
    async fn fetch_lock_capabilities(&self, serial: &str) -> Result<CapabilitiesResponse, ApiError>;

    /// Waiting variants: return once the lock reports back.
    async fn lock(&self, device_id: &str) -> Result<Vec<Activity>, ApiError>;
    async fn unlock(&self, device_id: &str) -> Result<Vec<Activity>, ApiError>;
    async fn unlatch(&self, device_id: &str) -> Result<Vec<Activity>, ApiError>;

    /// Fire-and-forget variants: the result arrives later as a push message.
    /// Return the backend request id.
    async fn lock_async(&self, device_id: &str, hyper_bridge: bool) -> Result<String, ApiError>;
    async fn unlock_async(&self, device_id: &str, hyper_bridge: bool) -> Result<String, ApiError>;
    async fn unlatch_async(&self, device_id: &str, hyper_bridge: bool) -> Result<String, ApiError>;
}

/// Local activity history.
pub trait HistorySink: Send + Sync {
    /// Returns true if any activity was newer than what was recorded before.
    fn record_activities(&self, device_id: &str, activities: &[Activity]) -> bool;
}

/// Whoever wants to hear that a device's local state moved.
pub trait DeviceObserver: Send + Sync {
    fn notify_device_changed(&self, device_id: &str);
}
