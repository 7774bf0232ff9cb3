//! Push state deduplication engine.
//!
//! This module implements the **Functional Core** of push handling.
//! It acts as a pure state machine:
//! - **Input**: a push message, its source and the activities parsed from it.
//! - **Output**: a [`PushClassification`] saying whether the message carries new information.
//!
//! # Trust rules
//! * **Confirmed transport**: every message is authoritative and redefines the baseline.
//! * **Status-only snapshot**: seeds the baseline once; afterwards it can be reported as
//!   actionable but never overwrites what a confirmed action established.
//! * **Snapshot with a confirmed action**: always actionable, always overwrites.
//!
//! # Architecture guarantees
//! * **No Network / No Async**: classification is synchronous and CPU-bound.
//! * **Deterministic**: the same sequence of messages always yields the same classifications.

pub mod state;
mod logic;
pub mod types;


pub use crate::streaming::engine::state::PushState;
pub use crate::streaming::engine::types::PushClassification;

use crate::streaming::domain::Activity;
use crate::streaming::types::{PushMessage, PushSource};

use state::TrackerState;

/// Tracks the last trusted `{lock, door}` state per (device, source).
#[derive(Debug, Default)]
pub struct PushStateTracker {
    state: TrackerState,
}

impl PushStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies one message and updates the baseline according to the trust rules.
    ///
    /// `activities` are the ones extracted from the same message; an empty
    /// list counts as status-only.
    pub fn classify(
        &mut self,
        device_id: &str,
        message: &PushMessage,
        source: PushSource,
        activities: &[Activity],
    ) -> PushClassification {
        let key = (device_id.to_string(), source);
        let incoming = PushState::from_message(message, source);

        let result = match source {
            PushSource::Confirmed => logic::on_confirmed_transport(&mut self.state, key, incoming),
            PushSource::Snapshot if activities.iter().all(|a| a.is_status) => {
                logic::on_status_snapshot(&mut self.state, key, incoming)
            }
            PushSource::Snapshot => logic::on_confirmed_action(&mut self.state, key, incoming),
        };

        log::trace!("[ENGINE] {}/{} classified {}", device_id, source, result);
        result
    }

    /// Current baseline for a (device, source) pair.
    pub fn baseline(&self, device_id: &str, source: PushSource) -> Option<&PushState> {
        self.state.baselines.get(&(device_id.to_string(), source))
    }

    /// Number of tracked (device, source) pairs.
    pub fn tracked_len(&self) -> usize {
        self.state.baselines.len()
    }

    /// Seeds a baseline directly (Test only).
    #[cfg(test)]
    pub fn insert_baseline(&mut self, device_id: &str, source: PushSource, baseline: PushState) {
        self.state
            .baselines
            .insert((device_id.to_string(), source), baseline);
    }
}
