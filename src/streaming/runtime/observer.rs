use tokio::sync::broadcast;

use crate::streaming::backend::DeviceObserver;

/// Fans device-changed notifications out to any number of subscribers.
///
/// Slow subscribers lag and lose the oldest ids; the sender never blocks.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<String>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl DeviceObserver for BroadcastObserver {
    fn notify_device_changed(&self, device_id: &str) {
        if self.tx.send(device_id.to_string()).is_err() {
            log::trace!("[OBSERVER] no subscribers for {}", device_id);
        }
    }
}
