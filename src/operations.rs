//! Lock command dispatch.
//!
//! Locks that can unlatch treat "unlock" as unlatch and "open" as a plain
//! unlock; every other lock does the opposite.

use std::fmt;
use std::str::FromStr;

use crate::devices::DeviceRegistry;
use crate::error::OperationError;
use crate::streaming::backend::DeviceApi;
use crate::streaming::domain::Activity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOperation {
    Lock,
    Unlock,
    Open,
}

impl FromStr for LockOperation {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lock" => Ok(LockOperation::Lock),
            "unlock" => Ok(LockOperation::Unlock),
            "open" => Ok(LockOperation::Open),
            other => Err(OperationError::InvalidOperation(other.to_string())),
        }
    }
}

impl fmt::Display for LockOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockOperation::Lock => "lock",
            LockOperation::Unlock => "unlock",
            LockOperation::Open => "open",
        };
        f.write_str(name)
    }
}

/// Backend command actually issued for a requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCommand {
    Lock,
    Unlock,
    Unlatch,
}

impl LockOperation {
    pub fn command(self, unlatch_supported: bool) -> LockCommand {
        match (self, unlatch_supported) {
            (LockOperation::Lock, _) => LockCommand::Lock,
            (LockOperation::Unlock, true) => LockCommand::Unlatch,
            (LockOperation::Unlock, false) => LockCommand::Unlock,
            (LockOperation::Open, true) => LockCommand::Unlock,
            (LockOperation::Open, false) => LockCommand::Unlatch,
        }
    }
}

/// Issues `op` against `device_id`.
///
/// With push updates connected the fire-and-forget endpoint is used and the
/// result arrives later as a push message, so no activities are returned.
pub async fn operate_lock<A>(
    api: &A,
    registry: &DeviceRegistry,
    device_id: &str,
    op: LockOperation,
    push_updates_connected: bool,
    hyper_bridge: bool,
) -> Result<Vec<Activity>, OperationError>
where
    A: DeviceApi + ?Sized,
{
    let unlatch_supported = registry
        .get(device_id)
        .map(|d| d.unlatch_supported())
        .unwrap_or(false);
    let command = op.command(unlatch_supported);

    log::info!(
        "[OPERATIONS] {} on {} -> {:?} (push connected: {})",
        op,
        device_id,
        command,
        push_updates_connected
    );

    if push_updates_connected {
        let request_id = match command {
            LockCommand::Lock => api.lock_async(device_id, hyper_bridge).await?,
            LockCommand::Unlock => api.unlock_async(device_id, hyper_bridge).await?,
            LockCommand::Unlatch => api.unlatch_async(device_id, hyper_bridge).await?,
        };
        log::debug!("[OPERATIONS] {} accepted as {}", device_id, request_id);
        return Ok(Vec::new());
    }

    let activities = match command {
        LockCommand::Lock => api.lock(device_id).await?,
        LockCommand::Unlock => api.unlock(device_id).await?,
        LockCommand::Unlatch => api.unlatch(device_id).await?,
    };
    Ok(activities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::DeviceDetail;
    use crate::streaming::backend::RecordingDeviceApi;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new([
            DeviceDetail::lock("plain", "house", 5),
            DeviceDetail::lock("latching", "house", 17),
        ])
    }

    #[test]
    fn parses_operation_names() {
        assert_eq!("lock".parse::<LockOperation>().unwrap(), LockOperation::Lock);
        assert_eq!("Open".parse::<LockOperation>().unwrap(), LockOperation::Open);

        let err = "jiggle".parse::<LockOperation>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid operation: jiggle");
    }

    #[tokio::test]
    async fn unlatch_capable_lock_swaps_unlock_and_open() {
        let api = RecordingDeviceApi::new();
        let registry = registry();

        operate_lock(&api, &registry, "latching", LockOperation::Unlock, false, true)
            .await
            .unwrap();
        operate_lock(&api, &registry, "latching", LockOperation::Open, false, true)
            .await
            .unwrap();

        assert_eq!(api.operations(), vec!["unlatch(latching)", "unlock(latching)"]);
    }

    #[tokio::test]
    async fn plain_lock_uses_direct_mapping() {
        let api = RecordingDeviceApi::new();
        let registry = registry();

        let activities = operate_lock(&api, &registry, "plain", LockOperation::Unlock, false, true)
            .await
            .unwrap();
        operate_lock(&api, &registry, "plain", LockOperation::Open, false, true)
            .await
            .unwrap();
        operate_lock(&api, &registry, "plain", LockOperation::Lock, false, true)
            .await
            .unwrap();

        assert_eq!(activities.len(), 1);
        assert_eq!(
            api.operations(),
            vec!["unlock(plain)", "unlatch(plain)", "lock(plain)"]
        );
    }

    #[tokio::test]
    async fn push_connected_uses_async_endpoints() {
        let api = RecordingDeviceApi::new();
        let registry = registry();

        let activities = operate_lock(&api, &registry, "latching", LockOperation::Unlock, true, false)
            .await
            .unwrap();

        assert!(activities.is_empty());
        assert_eq!(api.operations(), vec!["unlatch_async(latching, false)"]);
    }

    #[tokio::test]
    async fn unknown_device_uses_non_unlatch_mapping() {
        let api = RecordingDeviceApi::new();

        operate_lock(&api, &registry(), "ghost", LockOperation::Open, true, true)
            .await
            .unwrap();

        assert_eq!(api.operations(), vec!["unlatch_async(ghost, true)"]);
    }
}
