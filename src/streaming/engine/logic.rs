use crate::streaming::engine::state::{PushState, StateKey, TrackerState};
use crate::streaming::engine::types::PushClassification;

/// Confirmed transport: always authoritative. Any field it reports that the
/// baseline lacks or disagrees with is absorbed.
pub fn on_confirmed_transport(
    state: &mut TrackerState,
    key: StateKey,
    incoming: PushState,
) -> PushClassification {
    match state.baselines.get_mut(&key) {
        Some(baseline) if baseline.covers(&incoming) => PushClassification::Unchanged,
        Some(baseline) => {
            log::trace!("[ENGINE] {:?}: {:?} -> {:?}", key, baseline, incoming);
            baseline.absorb(incoming);
            PushClassification::Actionable
        }
        None => {
            state.baselines.insert(key, incoming);
            PushClassification::Actionable
        }
    }
}

/// Snapshot made only of status observations.
///
/// The first one seeds the baseline. Later ones may be reported as
/// actionable but never redefine the baseline.
pub fn on_status_snapshot(
    state: &mut TrackerState,
    key: StateKey,
    incoming: PushState,
) -> PushClassification {
    match state.baselines.get(&key) {
        None => {
            log::debug!("[ENGINE] {:?}: initial baseline {:?}", key, incoming);
            state.baselines.insert(key, incoming);
            PushClassification::Actionable
        }
        Some(baseline) if baseline.matches(&incoming) => PushClassification::Unchanged,
        Some(baseline) => {
            log::debug!(
                "[ENGINE] {:?}: status {:?} differs from baseline {:?}, baseline kept",
                key,
                incoming,
                baseline
            );
            PushClassification::Actionable
        }
    }
}

/// Snapshot carrying at least one confirmed action: fully trusted.
pub fn on_confirmed_action(
    state: &mut TrackerState,
    key: StateKey,
    incoming: PushState,
) -> PushClassification {
    state
        .baselines
        .entry(key)
        .and_modify(|baseline| baseline.absorb(incoming.clone()))
        .or_insert(incoming);
    PushClassification::Actionable
}
