use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use authstate_core::{
    clock::{duration_millis, Clock, SystemClock},
    session::{ExpirationReason, SessionRecord, SessionView},
    storage::{load_json, store_json, KeyValueStore, StorageError},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::SessionConfig,
    listener::{ExpirationListener, ListenerId, Listeners},
    scheduler::{Scheduler, TimerHandle, TimerTask, TokioScheduler},
};

/// Storage key of the singleton session record.
pub const SESSION_KEY: &str = "session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Absolute,
    Inactivity,
}

#[derive(Default)]
struct Timers {
    next_id: u64,
    absolute: Option<(u64, TimerHandle)>,
    inactivity: Option<(u64, TimerHandle)>,
}

impl Timers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<(u64, TimerHandle)> {
        match kind {
            TimerKind::Absolute => &mut self.absolute,
            TimerKind::Inactivity => &mut self.inactivity,
        }
    }

    fn cancel_all(&mut self) {
        for (_, handle) in [self.absolute.take(), self.inactivity.take()]
            .into_iter()
            .flatten()
        {
            handle.cancel();
        }
    }
}

struct Inner<S> {
    store: S,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    listeners: Mutex<Listeners>,
    timers: Mutex<Timers>,
}

/// Session lifecycle over a `KeyValueStore`.
///
/// States are `NoSession` and `Active`. A session is valid while
/// `now <= expires_at` and `now <= last_activity + inactivity_timeout`; when
/// both deadlines have passed the absolute one is reported. Every read
/// re-checks both deadlines, so a timer that never fired (suspended process,
/// missing runtime) cannot keep an expired session alive.
///
/// Clones share state. There is no cross-process locking: one owner is
/// assumed to hold the storage keys.
pub struct SessionManager<S: KeyValueStore> {
    inner: Arc<Inner<S>>,
}

impl<S: KeyValueStore> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: KeyValueStore + 'static> SessionManager<S> {
    /// Manager driven by the wall clock and tokio timers.
    pub fn new(store: S, config: SessionConfig) -> Self {
        Self::with_clock_and_scheduler(store, config, SystemClock, TokioScheduler)
    }

    pub fn with_clock_and_scheduler(
        store: S,
        config: SessionConfig,
        clock: impl Clock + 'static,
        scheduler: impl Scheduler + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                clock: Arc::new(clock),
                scheduler: Arc::new(scheduler),
                listeners: Mutex::new(Listeners::default()),
                timers: Mutex::new(Timers::default()),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn subscribe(&self, listener: impl ExpirationListener + 'static) -> ListenerId {
        lock(&self.inner.listeners).add(Arc::new(listener))
    }

    /// Returns `false` if the id was not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        lock(&self.inner.listeners).remove(id)
    }

    /// Replace any current session with a fresh one for `credential_id`.
    #[instrument(skip(self))]
    pub async fn start_session(&self, credential_id: &str) -> Result<SessionView, StorageError> {
        let now = self.now();
        let record = SessionRecord::start(credential_id, now, self.max_duration_millis());
        store_json(&self.inner.store, SESSION_KEY, &record).await?;

        self.cancel_timers();
        self.arm(TimerKind::Absolute, record.expires_at, now);
        self.arm(
            TimerKind::Inactivity,
            record.inactivity_deadline(self.inactivity_millis()),
            now,
        );

        info!(expires_at = record.expires_at, "session started");
        Ok(record.view())
    }

    /// Cancel timers and delete the session record. Idempotent; listeners are not notified.
    #[instrument(skip(self))]
    pub async fn end_session(&self) -> Result<(), StorageError> {
        self.cancel_timers();
        self.inner.store.remove(SESSION_KEY).await?;
        debug!("session ended");
        Ok(())
    }

    /// Current session, or `None` after ending it if a deadline has elapsed.
    pub async fn get_session(&self) -> Result<Option<SessionView>, StorageError> {
        Ok(self.validate().await?.map(|record| record.view()))
    }

    pub async fn is_authenticated(&self) -> Result<bool, StorageError> {
        Ok(self.get_session().await?.is_some())
    }

    /// Slide the inactivity window to now. Never extends the absolute deadline,
    /// and never revives a session whose deadline already elapsed.
    #[instrument(skip(self))]
    pub async fn record_activity(&self) -> Result<(), StorageError> {
        let Some(mut record) = self.load_record().await? else {
            return Ok(());
        };

        let now = self.now();
        if let Some(reason) = record.expiration_at(now, self.inactivity_millis()) {
            return self.expire(reason).await;
        }

        record.last_activity = record.last_activity.max(now);
        store_json(&self.inner.store, SESSION_KEY, &record).await?;
        self.arm(
            TimerKind::Inactivity,
            record.inactivity_deadline(self.inactivity_millis()),
            now,
        );
        Ok(())
    }

    /// Milliseconds until the absolute deadline; 0 without a valid session.
    pub async fn get_time_remaining(&self) -> Result<u64, StorageError> {
        let Some(session) = self.get_session().await? else {
            return Ok(0);
        };
        let remaining = session.expires_at.saturating_sub(self.now());
        Ok(u64::try_from(remaining).unwrap_or(0))
    }

    /// Cold start: validate a persisted session and arm both timers for it.
    /// Calling it again re-arms the timers.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<Option<SessionView>, StorageError> {
        let Some(record) = self.validate().await? else {
            return Ok(None);
        };

        let now = self.now();
        self.cancel_timers();
        self.arm(TimerKind::Absolute, record.expires_at, now);
        self.arm(
            TimerKind::Inactivity,
            record.inactivity_deadline(self.inactivity_millis()),
            now,
        );
        debug!("restored persisted session");
        Ok(Some(record.view()))
    }

    /// Cancel timers without touching persisted state.
    pub fn destroy(&self) {
        self.cancel_timers();
    }

    async fn validate(&self) -> Result<Option<SessionRecord>, StorageError> {
        let Some(record) = self.load_record().await? else {
            return Ok(None);
        };

        if let Some(reason) = record.expiration_at(self.now(), self.inactivity_millis()) {
            self.expire(reason).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn load_record(&self) -> Result<Option<SessionRecord>, StorageError> {
        match load_json::<SessionRecord, _>(&self.inner.store, SESSION_KEY).await {
            Err(StorageError::Serialization { reason }) => {
                warn!(%reason, "discarding unreadable session record");
                self.end_session().await?;
                Ok(None)
            }
            other => other,
        }
    }

    async fn expire(&self, reason: ExpirationReason) -> Result<(), StorageError> {
        self.end_session().await?;
        info!(%reason, "session expired");
        self.notify(reason);
        Ok(())
    }

    fn notify(&self, reason: ExpirationReason) {
        let listeners = lock(&self.inner.listeners).snapshot();
        for listener in listeners {
            listener.on_expiration(reason);
        }
    }

    /// Arm (or re-arm) one timer to fire just after `deadline`, where the
    /// strict `now > deadline` check is already true.
    fn arm(&self, kind: TimerKind, deadline: i64, now: i64) {
        let delay_millis = deadline.saturating_sub(now).saturating_add(1);
        let delay = Duration::from_millis(u64::try_from(delay_millis).unwrap_or(0));

        let weak = Arc::downgrade(&self.inner);
        let mut timers = lock(&self.inner.timers);
        timers.next_id += 1;
        let id = timers.next_id;

        let task: TimerTask = Box::pin(async move {
            if let Some(inner) = weak.upgrade() {
                SessionManager { inner }.on_timer(kind, id).await;
            }
        });
        let handle = self.inner.scheduler.schedule(delay, task);
        if let Some((_, previous)) = timers.slot(kind).replace((id, handle)) {
            previous.cancel();
        }
    }

    async fn on_timer(&self, kind: TimerKind, id: u64) {
        let current = {
            let mut timers = lock(&self.inner.timers);
            let slot = timers.slot(kind);
            if slot.as_ref().map(|(armed, _)| *armed) == Some(id) {
                // Detach rather than cancel: this task is the timer.
                slot.take();
                true
            } else {
                false
            }
        };
        if !current {
            return;
        }

        debug!(?kind, "session timer fired");
        match self.validate().await {
            // Fired early against the clock (e.g. it stepped back): keep watching.
            Ok(Some(record)) => {
                let deadline = match kind {
                    TimerKind::Absolute => record.expires_at,
                    TimerKind::Inactivity => record.inactivity_deadline(self.inactivity_millis()),
                };
                let vacant = lock(&self.inner.timers).slot(kind).is_none();
                if vacant {
                    self.arm(kind, deadline, self.now());
                }
            }
            Ok(None) => {}
            Err(err) => warn!(%err, "session deadline check failed"),
        }
    }

    fn cancel_timers(&self) {
        lock(&self.inner.timers).cancel_all();
    }

    fn now(&self) -> i64 {
        self.inner.clock.now_millis()
    }

    fn max_duration_millis(&self) -> i64 {
        duration_millis(self.inner.config.max_session_duration)
    }

    fn inactivity_millis(&self) -> i64 {
        duration_millis(self.inner.config.inactivity_timeout)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use authstate_core::{clock::ManualClock, storage::InMemoryStore};
    use serde_json::json;

    use super::*;
    use crate::scheduler::ManualScheduler;

    const T0: i64 = 1_700_000_000_000;

    fn mins(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    struct Harness {
        manager: SessionManager<InMemoryStore>,
        store: InMemoryStore,
        clock: ManualClock,
        scheduler: ManualScheduler,
        reasons: Arc<Mutex<Vec<ExpirationReason>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self::on(InMemoryStore::new(), ManualClock::new(T0))
        }

        fn on(store: InMemoryStore, clock: ManualClock) -> Self {
            let scheduler = ManualScheduler::new(clock.clone());
            let manager = SessionManager::with_clock_and_scheduler(
                store.clone(),
                SessionConfig::default(),
                clock.clone(),
                scheduler.clone(),
            );
            let reasons = Arc::new(Mutex::new(Vec::new()));
            let sink = reasons.clone();
            manager.subscribe(move |reason: ExpirationReason| sink.lock().unwrap().push(reason));
            Self {
                manager,
                store,
                clock,
                scheduler,
                reasons,
            }
        }

        /// Jump the clock without running timers, exercising the lazy path only.
        fn at(&self, offset: Duration) {
            self.clock.set(T0 + duration_millis(offset));
        }

        fn reasons(&self) -> Vec<ExpirationReason> {
            self.reasons.lock().unwrap().clone()
        }

        async fn keep_active_until(&self, last_minute: u64) {
            for minute in (4..=last_minute).step_by(4) {
                self.at(mins(minute));
                self.manager.record_activity().await.expect("activity");
            }
        }
    }

    #[tokio::test]
    async fn start_returns_view_and_time_remaining_within_cap() {
        let h = Harness::new();
        let view = h.manager.start_session("cred-1").await.expect("start");

        assert!(view.is_authenticated);
        assert_eq!(view.active_credential_id, "cred-1");
        assert_eq!(view.expires_at, T0 + 30 * 60 * 1000);
        assert_eq!(view.last_activity, T0);

        let remaining = h.manager.get_time_remaining().await.expect("remaining");
        assert!(remaining > 0 && remaining <= 30 * 60 * 1000);
        assert!(h.manager.is_authenticated().await.expect("auth"));

        h.at(mins(4));
        assert_eq!(
            h.manager.get_time_remaining().await.expect("remaining"),
            26 * 60 * 1000
        );
    }

    #[tokio::test]
    async fn persists_record_with_documented_shape() {
        let h = Harness::new();
        h.manager.start_session("cred-1").await.expect("start");
        h.at(mins(2));
        h.manager.record_activity().await.expect("activity");

        assert_eq!(
            h.store.get(SESSION_KEY).await.expect("get"),
            Some(json!({
                "createdAt": T0,
                "expiresAt": T0 + 1_800_000,
                "lastActivity": T0 + 120_000,
                "activeCredentialId": "cred-1",
            }))
        );
    }

    #[tokio::test]
    async fn lazy_read_reports_expired_over_activity_recorded_earlier() {
        let h = Harness::new();
        h.manager.start_session("cred-1").await.expect("start");

        h.at(mins(4));
        h.manager.record_activity().await.expect("activity");
        h.at(mins(8));
        assert!(h.manager.get_session().await.expect("get").is_some());

        h.at(mins(31));
        assert!(h.manager.get_session().await.expect("get").is_none());
        assert_eq!(h.reasons(), vec![ExpirationReason::Expired]);
        assert_eq!(h.store.get(SESSION_KEY).await.expect("get"), None);
    }

    #[tokio::test]
    async fn timers_follow_the_thirty_five_minute_scenario() {
        let h = Harness::new();
        h.manager.start_session("cred-1").await.expect("start");
        assert_eq!(h.scheduler.pending(), 2);

        h.scheduler.advance(mins(4)).await;
        h.manager.record_activity().await.expect("activity");
        assert_eq!(h.scheduler.pending(), 2);

        // Window was reset at 4m, so 8m is still inside it.
        h.scheduler.advance(mins(4)).await;
        assert!(h.manager.get_session().await.expect("get").is_some());
        assert!(h.reasons().is_empty());
        h.manager.record_activity().await.expect("activity");

        for _ in 0..5 {
            h.scheduler.advance(mins(4)).await;
            h.manager.record_activity().await.expect("activity");
        }
        assert!(h.reasons().is_empty());

        // 28m -> 31m crosses the absolute deadline at 30m.
        h.scheduler.advance(mins(3)).await;
        assert_eq!(h.reasons(), vec![ExpirationReason::Expired]);
        assert_eq!(h.scheduler.pending(), 0);
        assert!(h.manager.get_session().await.expect("get").is_none());
        assert_eq!(h.reasons(), vec![ExpirationReason::Expired]);
    }

    #[tokio::test]
    async fn sliding_window_expires_with_inactivity() {
        let h = Harness::new();
        h.manager.start_session("cred-1").await.expect("start");

        h.at(mins(5));
        assert!(h.manager.get_session().await.expect("get").is_some());

        h.at(mins(5) + Duration::from_millis(1));
        assert!(h.manager.get_session().await.expect("get").is_none());
        assert_eq!(h.reasons(), vec![ExpirationReason::Inactivity]);
    }

    #[tokio::test]
    async fn absolute_deadline_dominates_recent_activity() {
        let h = Harness::new();
        h.manager.start_session("cred-1").await.expect("start");
        h.keep_active_until(28).await;

        h.at(mins(30));
        assert!(h.manager.get_session().await.expect("get").is_some());

        h.at(mins(30) + Duration::from_millis(1));
        assert!(h.manager.get_session().await.expect("get").is_none());
        assert_eq!(h.reasons(), vec![ExpirationReason::Expired]);
    }

    #[tokio::test]
    async fn activity_cannot_resurrect_expired_session() {
        let h = Harness::new();
        let view = h.manager.start_session("cred-1").await.expect("start");
        h.keep_active_until(28).await;

        h.at(mins(31));
        h.manager.record_activity().await.expect("activity");

        assert_eq!(h.reasons(), vec![ExpirationReason::Expired]);
        assert_eq!(h.store.get(SESSION_KEY).await.expect("get"), None);
        assert!(h.manager.get_session().await.expect("get").is_none());
        assert_eq!(h.reasons().len(), 1);
        assert_eq!(view.expires_at, T0 + 1_800_000);
    }

    #[tokio::test]
    async fn activity_after_inactivity_lapse_ends_session() {
        let h = Harness::new();
        h.manager.start_session("cred-1").await.expect("start");

        h.at(mins(6));
        h.manager.record_activity().await.expect("activity");
        assert_eq!(h.reasons(), vec![ExpirationReason::Inactivity]);
        assert!(!h.manager.is_authenticated().await.expect("auth"));
    }

    #[tokio::test]
    async fn record_activity_without_session_is_a_no_op() {
        let h = Harness::new();
        h.manager.record_activity().await.expect("activity");
        assert!(h.store.is_empty());
        assert!(h.reasons().is_empty());
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn last_activity_never_moves_backwards() {
        let h = Harness::new();
        h.manager.start_session("cred-1").await.expect("start");
        h.at(mins(3));
        h.manager.record_activity().await.expect("activity");
        h.at(mins(2));
        h.manager.record_activity().await.expect("activity");

        let view = h.manager.get_session().await.expect("get").expect("active");
        assert_eq!(view.last_activity, T0 + 180_000);
    }

    #[tokio::test]
    async fn end_session_and_destroy_are_idempotent() {
        let h = Harness::new();
        h.manager.end_session().await.expect("end without session");
        h.manager.destroy();

        h.manager.start_session("cred-1").await.expect("start");
        h.manager.end_session().await.expect("end");
        h.manager.end_session().await.expect("end again");
        h.manager.destroy();
        h.manager.destroy();

        assert!(h.reasons().is_empty());
        assert_eq!(h.scheduler.pending(), 0);
        assert!(!h.manager.is_authenticated().await.expect("auth"));
        assert_eq!(h.manager.get_time_remaining().await.expect("remaining"), 0);
    }

    #[tokio::test]
    async fn destroy_keeps_persisted_session() {
        let h = Harness::new();
        h.manager.start_session("cred-1").await.expect("start");
        h.manager.destroy();

        assert_eq!(h.scheduler.pending(), 0);
        assert!(h.store.get(SESSION_KEY).await.expect("get").is_some());
        assert!(h.manager.get_session().await.expect("get").is_some());
    }

    #[tokio::test]
    async fn timer_and_lazy_paths_agree_on_inactivity() {
        let timed = Harness::new();
        let lazy = Harness::new();
        timed.manager.start_session("cred-1").await.expect("start");
        lazy.manager.start_session("cred-1").await.expect("start");

        // Exactly at the deadline both paths still consider the session valid.
        timed.scheduler.advance(mins(5)).await;
        lazy.at(mins(5));
        assert!(timed.reasons().is_empty());
        assert!(lazy.manager.get_session().await.expect("get").is_some());

        timed.scheduler.advance(Duration::from_millis(1)).await;
        lazy.at(mins(5) + Duration::from_millis(1));
        assert_eq!(timed.reasons(), vec![ExpirationReason::Inactivity]);
        assert_eq!(timed.store.get(SESSION_KEY).await.expect("get"), None);

        assert!(lazy.manager.get_session().await.expect("get").is_none());
        assert_eq!(lazy.reasons(), timed.reasons());
    }

    #[tokio::test]
    async fn timer_and_lazy_paths_agree_on_absolute_expiry() {
        let timed = Harness::new();
        let lazy = Harness::new();
        timed.manager.start_session("cred-1").await.expect("start");
        lazy.manager.start_session("cred-1").await.expect("start");

        for _ in 0..7 {
            timed.scheduler.advance(mins(4)).await;
            timed.manager.record_activity().await.expect("activity");
        }
        lazy.keep_active_until(28).await;

        timed.scheduler.advance(mins(2)).await;
        lazy.at(mins(30));
        assert!(timed.reasons().is_empty());
        assert!(lazy.manager.get_session().await.expect("get").is_some());

        timed.scheduler.advance(Duration::from_millis(1)).await;
        lazy.at(mins(30) + Duration::from_millis(1));
        assert!(lazy.manager.get_session().await.expect("get").is_none());
        assert_eq!(timed.reasons(), vec![ExpirationReason::Expired]);
        assert_eq!(lazy.reasons(), timed.reasons());
    }

    #[tokio::test]
    async fn initialize_restores_timers_for_persisted_session() {
        let first = Harness::new();
        let started = first.manager.start_session("cred-1").await.expect("start");
        first.manager.destroy();

        let second = Harness::on(first.store.clone(), first.clock.clone());
        let restored = second
            .manager
            .initialize()
            .await
            .expect("initialize")
            .expect("session restored");
        assert_eq!(restored, started);
        assert_eq!(second.scheduler.pending(), 2);

        second.manager.initialize().await.expect("initialize again");
        assert_eq!(second.scheduler.pending(), 2);

        second
            .scheduler
            .advance(mins(5) + Duration::from_millis(1))
            .await;
        assert_eq!(second.reasons(), vec![ExpirationReason::Inactivity]);
        assert!(first.reasons().is_empty());
    }

    #[tokio::test]
    async fn initialize_discards_expired_session() {
        let first = Harness::new();
        first.manager.start_session("cred-1").await.expect("start");
        first.manager.destroy();

        let second = Harness::on(first.store.clone(), first.clock.clone());
        second.at(mins(31));
        assert!(second.manager.initialize().await.expect("init").is_none());
        assert_eq!(second.reasons(), vec![ExpirationReason::Expired]);
        assert_eq!(second.scheduler.pending(), 0);
        assert!(first.store.is_empty());
    }

    #[tokio::test]
    async fn restarting_replaces_session_and_timers() {
        let h = Harness::new();
        h.manager.start_session("cred-1").await.expect("start");
        h.at(mins(1));
        let second = h.manager.start_session("cred-2").await.expect("restart");

        assert_eq!(h.scheduler.pending(), 2);
        assert_eq!(second.active_credential_id, "cred-2");
        assert_eq!(second.expires_at, T0 + 60_000 + 1_800_000);
    }

    #[tokio::test]
    async fn explicit_end_does_not_notify() {
        let h = Harness::new();
        h.manager.start_session("cred-1").await.expect("start");
        h.manager.end_session().await.expect("end");
        h.scheduler.advance(mins(60)).await;
        assert!(h.reasons().is_empty());
    }

    #[tokio::test]
    async fn unsubscribed_listeners_are_not_called() {
        let h = Harness::new();
        let extra = Arc::new(Mutex::new(0usize));
        let counter = extra.clone();
        let id = h
            .manager
            .subscribe(move |_: ExpirationReason| *counter.lock().unwrap() += 1);
        assert!(h.manager.unsubscribe(id));
        assert!(!h.manager.unsubscribe(id));

        h.manager.start_session("cred-1").await.expect("start");
        h.at(mins(10));
        h.manager.get_session().await.expect("get");

        assert_eq!(*extra.lock().unwrap(), 0);
        assert_eq!(h.reasons(), vec![ExpirationReason::Inactivity]);
    }

    #[tokio::test]
    async fn unreadable_record_is_discarded_without_notification() {
        let h = Harness::new();
        h.store
            .set(SESSION_KEY, json!("garbage"))
            .await
            .expect("set");

        assert!(h.manager.get_session().await.expect("get").is_none());
        assert!(h.reasons().is_empty());
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn timers_are_inert_once_manager_is_dropped() {
        let Harness {
            manager,
            scheduler,
            reasons,
            store,
            ..
        } = Harness::new();
        manager.start_session("cred-1").await.expect("start");
        drop(manager);

        scheduler.advance(mins(60)).await;
        assert!(reasons.lock().unwrap().is_empty());
        assert!(store.get(SESSION_KEY).await.expect("get").is_some());
    }

    /// Hands timers to the test instead of running them on a clock.
    #[derive(Clone, Default)]
    struct CapturingScheduler {
        tasks: Arc<Mutex<Vec<(Duration, Option<TimerTask>)>>>,
    }

    impl CapturingScheduler {
        fn take(&self, index: usize) -> (Duration, TimerTask) {
            let mut tasks = self.tasks.lock().unwrap();
            let (delay, task) = &mut tasks[index];
            (*delay, task.take().expect("timer already taken"))
        }

        fn len(&self) -> usize {
            self.tasks.lock().unwrap().len()
        }
    }

    impl Scheduler for CapturingScheduler {
        fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
            self.tasks.lock().unwrap().push((delay, Some(task)));
            TimerHandle::noop()
        }
    }

    #[tokio::test]
    async fn early_timer_rearms_instead_of_going_quiet() {
        let clock = ManualClock::new(T0);
        let scheduler = CapturingScheduler::default();
        let manager = SessionManager::with_clock_and_scheduler(
            InMemoryStore::new(),
            SessionConfig::default(),
            clock.clone(),
            scheduler.clone(),
        );
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sink = reasons.clone();
        manager.subscribe(move |reason: ExpirationReason| sink.lock().unwrap().push(reason));

        manager.start_session("cred-1").await.expect("start");
        assert_eq!(scheduler.len(), 2);

        // Inactivity timer delivered while the clock still reads inside the window.
        clock.set(T0 + duration_millis(mins(1)));
        let (_, inactivity) = scheduler.take(1);
        inactivity.await;
        assert!(manager.is_authenticated().await.expect("auth"));
        assert_eq!(scheduler.len(), 3);

        let (delay, rearmed) = scheduler.take(2);
        assert_eq!(delay, mins(4) + Duration::from_millis(1));
        clock.set(T0 + duration_millis(mins(5)) + 1);
        rearmed.await;

        assert_eq!(*reasons.lock().unwrap(), vec![ExpirationReason::Inactivity]);
        assert!(manager.get_session().await.expect("get").is_none());
    }
}
