use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::streaming::runtime::dispatcher::PushMessageDispatcher;
use crate::streaming::types::PushEnvelope;

/// Drives the dispatcher from the push transport's channel.
pub struct PushDriver {
    dispatcher: Arc<PushMessageDispatcher>,
    rx: mpsc::Receiver<PushEnvelope>,

    /// Timeline
    t0: Instant,
}

impl PushDriver {
    pub fn new(dispatcher: Arc<PushMessageDispatcher>, rx: mpsc::Receiver<PushEnvelope>) -> Self {
        Self {
            dispatcher,
            rx,
            t0: Instant::now(),
        }
    }

    fn t(&self) -> u128 {
        self.t0.elapsed().as_micros()
    }

    fn info(&self, msg: &str) {
        log::info!("[DRIVER] {:>8}us: {}", self.t(), msg);
    }

    fn trace(&self, msg: &str) {
        log::trace!("[DRIVER] {:>8}us: {}", self.t(), msg);
    }

    /// Runs until every sender is dropped, then shuts the scheduler down.
    ///
    /// Returns the number of envelopes handled.
    pub async fn run(mut self) -> usize {
        self.info("starting driver");
        let mut handled = 0;

        while let Some(envelope) = self.rx.recv().await {
            self.trace(&format!(
                "event: push({}, {})",
                envelope.device_id, envelope.source
            ));

            let result = self.dispatcher.handle(
                &envelope.device_id,
                envelope.observed_at,
                &envelope.message,
                envelope.source,
            );
            if let Some(classification) = result {
                self.trace(&format!("{} -> {}", envelope.device_id, classification));
            }
            handled += 1;
        }

        self.info(&format!("channel closed after {} messages", handled));
        self.dispatcher.scheduler().shutdown();
        handled
    }
}
