//! Sync coordinator
//!
//! Tracks the dirty flag across all registered stores, runs the periodic
//! flush and exposes manual sync. It never touches domain data itself; it
//! only asks each store to fetch or push.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::try_join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::state::{SyncOutcome, SyncState, SyncStatus};
use crate::error::Result;
use crate::stores::{ChangeListener, ChangeNotifier, SharedRemoteSync};

/// Default auto-sync period
pub const DEFAULT_AUTO_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Coordinates pushes and loads across the domain stores
pub struct SyncCoordinator {
    /// Current state; receivers see every transition
    state: watch::Sender<SyncState>,
    /// Stores in push order
    stores: Mutex<Vec<SharedRemoteSync>>,
    /// Running auto-sync task, if any
    timer: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
    /// Bumped on every modification; lets a finishing sync tell whether
    /// edits landed while it was running
    generation: Mutex<u64>,
    this: Weak<SyncCoordinator>,
}

impl SyncCoordinator {
    /// Create a coordinator with the given auto-sync period
    pub fn new(interval: Duration) -> Arc<Self> {
        let (state, _) = watch::channel(SyncState::default());
        Arc::new_cyclic(|this| Self {
            state,
            stores: Mutex::new(Vec::new()),
            timer: Mutex::new(None),
            interval,
            generation: Mutex::new(0),
            this: this.clone(),
        })
    }

    /// Add a store; stores are pushed in registration order
    pub fn register(&self, store: SharedRemoteSync) {
        debug!("[sync] registered store {}", store.name());
        lock(&self.stores).push(store);
    }

    /// A notifier that marks this coordinator as modified
    pub fn notifier(&self) -> ChangeNotifier {
        let listener: Weak<dyn ChangeListener> = self.this.clone();
        ChangeNotifier::new(listener)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn has_unsynced_changes(&self) -> bool {
        self.state.borrow().has_unsynced_changes
    }

    pub fn show_sync_button(&self) -> bool {
        self.state.borrow().show_sync_button()
    }

    pub fn status_text(&self) -> &'static str {
        self.state.borrow().status_text()
    }

    /// Flag pending local changes and make sure the timer runs
    pub fn mark_as_modified(&self) {
        *lock(&self.generation) += 1;
        self.state.send_modify(|s| s.has_unsynced_changes = true);
        debug!("[sync] marked as modified");
        self.start_auto_sync();
    }

    /// Start the periodic flush unless it is already running
    pub fn start_auto_sync(&self) {
        let mut timer = lock(&self.timer);
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("[sync] no async runtime; auto-sync not started");
            return;
        };

        info!("[sync] starting auto-sync timer ({:?})", self.interval);
        let coordinator = self.this.clone();
        let period = self.interval;
        *timer = Some(runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                coordinator.on_tick().await;
            }
        }));
    }

    /// Stop the periodic flush
    pub fn stop_auto_sync(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            info!("[sync] stopping auto-sync timer");
            handle.abort();
        }
    }

    pub fn is_auto_sync_running(&self) -> bool {
        lock(&self.timer)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn on_tick(&self) {
        debug!("[sync] auto-sync tick");
        if !self.has_unsynced_changes() {
            return;
        }
        if let Err(e) = self.sync_to_remote().await {
            warn!("[sync] auto-sync failed, retrying next tick: {}", e);
        }
    }

    /// Push every store in registration order
    ///
    /// Returns `AlreadySyncing` without doing anything if a sync is in
    /// flight. On failure the error is recorded, the dirty flag and timer
    /// are left alone and the error is returned.
    pub async fn sync_to_remote(&self) -> Result<SyncOutcome> {
        let mut started = false;
        self.state.send_if_modified(|s| {
            if s.sync_status == SyncStatus::Syncing {
                return false;
            }
            s.sync_status = SyncStatus::Syncing;
            s.sync_error = None;
            started = true;
            true
        });
        if !started {
            info!("[sync] already syncing, skip");
            return Ok(SyncOutcome::AlreadySyncing);
        }

        info!("[sync] starting sync to remote");
        let generation = *lock(&self.generation);
        let stores = lock(&self.stores).clone();

        for store in stores {
            if let Err(e) = store.synchronize_to_remote().await {
                warn!("[sync] sync failed in {}: {}", store.name(), e);
                self.state.send_modify(|s| {
                    s.sync_status = SyncStatus::Error;
                    s.sync_error = Some(e.to_string());
                });
                return Err(e);
            }
            debug!("[sync] {} pushed", store.name());
        }

        let clean = *lock(&self.generation) == generation;
        self.state.send_modify(|s| {
            s.has_unsynced_changes = !clean;
            s.last_sync_time = Some(Utc::now());
            s.sync_status = SyncStatus::Idle;
            s.sync_error = None;
        });

        if clean {
            self.stop_auto_sync();
            info!("[sync] sync completed successfully");
        } else {
            info!("[sync] sync completed; newer changes still pending");
        }
        Ok(SyncOutcome::Synced)
    }

    /// Fetch every store concurrently
    ///
    /// All fetches must succeed; on any failure nothing is marked
    /// initialized.
    pub async fn load_from_remote(&self) -> Result<()> {
        info!("[sync] loading data from remote");
        let stores = lock(&self.stores).clone();

        if let Err(e) = try_join_all(stores.iter().map(|store| store.fetch())).await {
            warn!("[sync] failed to load data: {}", e);
            return Err(e);
        }

        self.state.send_modify(|s| {
            s.last_sync_time = Some(Utc::now());
            s.initialized = true;
        });
        info!("[sync] data loaded successfully");
        Ok(())
    }
}

impl ChangeListener for SyncCoordinator {
    fn mark_as_modified(&self) {
        SyncCoordinator::mark_as_modified(self);
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::stores::RemoteSync;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const INTERVAL: Duration = Duration::from_secs(300);

    /// Records pushes into a shared log and can be told to fail or stall
    struct FakeStore {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        syncs: AtomicUsize,
        fail: AtomicBool,
        fail_fetch: bool,
        delay: Duration,
    }

    impl FakeStore {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                log: Arc::clone(log),
                syncs: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                fail_fetch: false,
                delay: Duration::ZERO,
            })
        }

        fn syncs(&self) -> usize {
            self.syncs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteSync for FakeStore {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self) -> Result<()> {
            if self.fail_fetch {
                return Err(Error::remote("fetch failed"));
            }
            Ok(())
        }

        async fn synchronize_to_remote(&self) -> Result<()> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::remote("offline"));
            }
            self.syncs.fetch_add(1, Ordering::SeqCst);
            lock(&self.log).push(self.name);
            Ok(())
        }
    }

    fn coordinator_with(store: &Arc<FakeStore>) -> Arc<SyncCoordinator> {
        let coordinator = SyncCoordinator::new(INTERVAL);
        coordinator.register(store.clone());
        coordinator
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_as_modified_starts_one_timer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let store = FakeStore::new("links", &log);
        let coordinator = coordinator_with(&store);

        coordinator.mark_as_modified();
        coordinator.mark_as_modified();
        assert!(coordinator.is_auto_sync_running());
        assert!(coordinator.has_unsynced_changes());

        tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;
        assert_eq!(store.syncs(), 1);
        assert!(!coordinator.has_unsynced_changes());
        assert!(!coordinator.is_auto_sync_running());

        // The timer stopped after the successful flush
        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(store.syncs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_tick_is_a_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let store = FakeStore::new("links", &log);
        let coordinator = coordinator_with(&store);

        coordinator.start_auto_sync();
        tokio::time::sleep(INTERVAL * 2 + Duration::from_millis(1)).await;
        assert_eq!(store.syncs(), 0);
        assert!(coordinator.is_auto_sync_running());
    }

    #[tokio::test]
    async fn test_sync_pushes_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = SyncCoordinator::new(INTERVAL);
        for name in ["settings", "links", "skins"] {
            coordinator.register(FakeStore::new(name, &log));
        }

        coordinator.mark_as_modified();
        let outcome = coordinator.sync_to_remote().await.unwrap();

        assert_eq!(outcome, SyncOutcome::Synced);
        assert_eq!(*lock(&log), vec!["settings", "links", "skins"]);
        let state = coordinator.state();
        assert_eq!(state.sync_status, SyncStatus::Idle);
        assert!(state.last_sync_time.is_some());
        assert!(state.sync_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_while_syncing_is_a_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(FakeStore {
            name: "links",
            log: Arc::clone(&log),
            syncs: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            fail_fetch: false,
            delay: Duration::from_secs(10),
        });
        let coordinator = coordinator_with(&store);
        coordinator.mark_as_modified();

        let running = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.sync_to_remote().await })
        };
        tokio::task::yield_now().await;
        assert_eq!(coordinator.state().sync_status, SyncStatus::Syncing);

        let outcome = coordinator.sync_to_remote().await.unwrap();
        assert_eq!(outcome, SyncOutcome::AlreadySyncing);
        assert!(coordinator.state().last_sync_time.is_none());

        assert_eq!(running.await.unwrap().unwrap(), SyncOutcome::Synced);
        assert_eq!(store.syncs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sync_keeps_dirty_flag_and_timer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let store = FakeStore::new("links", &log);
        store.fail.store(true, Ordering::SeqCst);
        let coordinator = coordinator_with(&store);

        coordinator.mark_as_modified();
        let err = coordinator.sync_to_remote().await.unwrap_err();
        assert!(err.is_recoverable());

        let state = coordinator.state();
        assert!(state.has_unsynced_changes);
        assert_eq!(state.sync_status, SyncStatus::Error);
        assert!(state.sync_error.unwrap().contains("offline"));
        assert!(coordinator.is_auto_sync_running());

        // The next tick retries and succeeds
        store.fail.store(false, Ordering::SeqCst);
        tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;

        let state = coordinator.state();
        assert!(!state.has_unsynced_changes);
        assert_eq!(state.sync_status, SyncStatus::Idle);
        assert!(!coordinator.is_auto_sync_running());
        assert_eq!(store.syncs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_during_sync_stay_dirty() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(FakeStore {
            name: "links",
            log: Arc::clone(&log),
            syncs: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            fail_fetch: false,
            delay: Duration::from_secs(1),
        });
        let coordinator = coordinator_with(&store);
        coordinator.mark_as_modified();

        let running = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.sync_to_remote().await })
        };
        tokio::task::yield_now().await;
        coordinator.mark_as_modified();

        running.await.unwrap().unwrap();
        assert!(coordinator.has_unsynced_changes());
        assert!(coordinator.is_auto_sync_running());
    }

    #[tokio::test]
    async fn test_load_from_remote_marks_initialized() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = SyncCoordinator::new(INTERVAL);
        coordinator.register(FakeStore::new("settings", &log));
        coordinator.register(FakeStore::new("links", &log));

        coordinator.load_from_remote().await.unwrap();
        let state = coordinator.state();
        assert!(state.initialized);
        assert!(state.last_sync_time.is_some());
    }

    #[tokio::test]
    async fn test_load_from_remote_failure_leaves_uninitialized() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = SyncCoordinator::new(INTERVAL);
        coordinator.register(FakeStore::new("settings", &log));
        coordinator.register(Arc::new(FakeStore {
            name: "links",
            log: Arc::clone(&log),
            syncs: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            fail_fetch: true,
            delay: Duration::ZERO,
        }));

        assert!(coordinator.load_from_remote().await.is_err());
        let state = coordinator.state();
        assert!(!state.initialized);
        assert!(state.last_sync_time.is_none());
    }

    #[tokio::test]
    async fn test_notifier_marks_coordinator() {
        let coordinator = SyncCoordinator::new(INTERVAL);
        let notifier = coordinator.notifier();
        notifier.notify();
        assert!(coordinator.has_unsynced_changes());
        assert_eq!(coordinator.status_text(), "Unsynced changes");
        assert!(coordinator.show_sync_button());
    }

    #[test]
    fn test_mark_without_runtime_does_not_panic() {
        let coordinator = SyncCoordinator::new(INTERVAL);
        coordinator.mark_as_modified();
        assert!(coordinator.has_unsynced_changes());
        assert!(!coordinator.is_auto_sync_running());
    }
}
