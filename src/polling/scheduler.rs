use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::SyncConfig;
use crate::history::group_by_device;
use crate::streaming::backend::{ActivityFetcher, HistorySink};

/// Catch-up polls owed after a request on an idle key.
const POLLS_PER_REQUEST: u32 = 2;

#[derive(Debug)]
struct ArmedTimer {
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// Bookkeeping for one group key. Created lazily, never removed.
#[derive(Debug, Default)]
struct RefreshSchedule {
    pending: u32,
    timer: Option<ArmedTimer>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    schedules: HashMap<String, RefreshSchedule>,

    /// One-shot startup resync per key. Present until its fetch completes.
    startup: HashMap<String, ArmedTimer>,

    /// Immediate fetches spawned by `setup`.
    initial: Vec<JoinHandle<()>>,

    shut_down: bool,
}

struct Inner {
    fetcher: Arc<dyn ActivityFetcher>,
    history: Arc<dyn HistorySink>,
    config: SyncConfig,
    state: Mutex<SchedulerState>,
}

/// Per-house debounce timer chains.
///
/// Cheap to clone; clones share the same schedules. Every method that arms a
/// timer must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    pub fn new(
        fetcher: Arc<dyn ActivityFetcher>,
        history: Arc<dyn HistorySink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                history,
                config,
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    /// Fetches every key right away and arms its one-shot startup resync.
    pub fn setup<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.inner.lock();
        if state.shut_down {
            log::warn!("[SCHEDULER] setup after shutdown ignored");
            return;
        }

        for key in keys {
            let key = key.into();
            log::info!("[SCHEDULER] {}: initial refresh", key);

            let inner = Arc::clone(&self.inner);
            let initial_key = key.clone();
            state.initial.push(tokio::spawn(async move {
                inner.refresh(&initial_key).await;
            }));

            let deadline = Instant::now() + self.inner.config.initial_resync_delay;
            let handle = tokio::spawn(Inner::fire_startup(
                Arc::clone(&self.inner),
                key.clone(),
                deadline,
            ));
            if let Some(previous) = state.startup.insert(key, ArmedTimer { deadline, handle }) {
                previous.handle.abort();
            }
        }
    }

    /// Asks for the key's activities to be refreshed soon.
    ///
    /// Never spawns a second timer for a key that already has one.
    pub fn request_refresh(&self, key: &str) {
        let mut state = self.inner.lock();
        if state.shut_down {
            log::debug!("[SCHEDULER] {}: refresh requested after shutdown, ignored", key);
            return;
        }

        if state.startup.contains_key(key) {
            let schedule = state.schedules.entry(key.to_string()).or_default();
            schedule.pending = schedule.pending.max(1);
            log::debug!("[SCHEDULER] {}: deferred to startup resync", key);
            return;
        }

        let schedule = state.schedules.entry(key.to_string()).or_default();
        schedule.pending = POLLS_PER_REQUEST;

        if schedule.timer.is_some() {
            log::debug!("[SCHEDULER] {}: mid-cycle, pending reset to {}", key, schedule.pending);
            return;
        }

        log::debug!(
            "[SCHEDULER] {}: idle, refreshing in {:?}",
            key,
            self.inner.config.soon_delay
        );
        schedule.timer = Some(Inner::arm(&self.inner, key, self.inner.config.soon_delay));
    }

    /// Cancels every armed timer. Nothing fires or re-arms afterwards.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        if state.shut_down {
            return;
        }
        state.shut_down = true;

        let mut cancelled = 0;
        for (_, timer) in state.startup.drain() {
            timer.handle.abort();
            cancelled += 1;
        }
        for schedule in state.schedules.values_mut() {
            if let Some(timer) = schedule.timer.take() {
                timer.handle.abort();
                cancelled += 1;
            }
        }
        for handle in state.initial.drain(..) {
            handle.abort();
        }

        log::info!("[SCHEDULER] shut down, {} timers cancelled", cancelled);
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Last known pending count; `None` for a key never requested.
    pub fn pending_count(&self, key: &str) -> Option<u32> {
        self.inner.lock().schedules.get(key).map(|s| s.pending)
    }

    /// True while a recurring timer is armed (or its firing is in progress).
    pub fn is_scheduled(&self, key: &str) -> bool {
        self.inner
            .lock()
            .schedules
            .get(key)
            .is_some_and(|s| s.timer.is_some())
    }

    /// Deadline of the key's armed recurring timer.
    pub fn next_fire_at(&self, key: &str) -> Option<Instant> {
        self.inner
            .lock()
            .schedules
            .get(key)
            .and_then(|s| s.timer.as_ref())
            .map(|t| t.deadline)
    }

    pub fn in_startup_window(&self, key: &str) -> bool {
        self.inner.lock().startup.contains_key(key)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shut_down
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawns a recurring firing. Caller stores the result in the key's schedule.
    fn arm(inner: &Arc<Self>, key: &str, delay: Duration) -> ArmedTimer {
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(Self::fire(Arc::clone(inner), key.to_string(), deadline));
        ArmedTimer { deadline, handle }
    }

    async fn fire(self: Arc<Self>, key: String, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
        log::trace!("[SCHEDULER] {}: timer fired", key);

        self.refresh(&key).await;

        let mut state = self.lock();
        if state.shut_down {
            return;
        }
        let Some(schedule) = state.schedules.get_mut(&key) else {
            return;
        };

        schedule.pending = schedule.pending.saturating_sub(1);
        if schedule.pending > 0 {
            log::debug!(
                "[SCHEDULER] {}: {} polls left, next in {:?}",
                key,
                schedule.pending,
                self.config.cooldown_delay
            );
            schedule.timer = Some(Self::arm(&self, &key, self.config.cooldown_delay));
        } else {
            log::debug!("[SCHEDULER] {}: idle", key);
            schedule.timer = None;
        }
    }

    async fn fire_startup(self: Arc<Self>, key: String, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;

        {
            let mut state = self.lock();
            if state.shut_down {
                return;
            }
            let schedule = state.schedules.entry(key.clone()).or_default();
            log::info!(
                "[SCHEDULER] {}: startup resync absorbs {} pending",
                key,
                schedule.pending
            );
            schedule.pending = 0;
            if let Some(timer) = schedule.timer.take() {
                timer.handle.abort();
            }
        }

        self.refresh(&key).await;

        let mut state = self.lock();
        if state.shut_down {
            return;
        }
        state.startup.remove(&key);

        // Requests that arrived while the resync was in flight start a normal chain.
        let Some(schedule) = state.schedules.get_mut(&key) else {
            return;
        };
        if schedule.pending > 0 {
            log::debug!("[SCHEDULER] {}: requested during startup resync", key);
            schedule.pending = POLLS_PER_REQUEST;
            schedule.timer = Some(Self::arm(&self, &key, self.config.soon_delay));
        }
    }

    /// One fetch. Results go to the history sink grouped by device.
    async fn refresh(&self, key: &str) {
        match self.fetcher.fetch_house_activities(key).await {
            Ok(activities) => {
                log::debug!("[SCHEDULER] {}: fetched {} activities", key, activities.len());

                for (device_id, batch) in group_by_device(&activities) {
                    self.history.record_activities(device_id, &batch);
                }
            }
            Err(err) => {
                log::warn!("[SCHEDULER] {}: refresh failed: {}", key, err);
            }
        }
    }
}
