//! Fixed-interval polling with a cached last good result.
//!
//! A [`Coordinator`] owns the only writable copy of the current [`PollResult`]. Readers get a
//! [`watch::Receiver`] and are woken after every cycle, whether it succeeded or not, so they can
//! decide on their own availability. A failed cycle never replaces the cached result.
use std::{fmt, future::Future, sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    error::ClientError, snapshot::PollResult, EcocompteurClient, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_SCAN_INTERVAL,
};

/// Something that can produce a [`PollResult`] on demand.
pub trait DataSource: Send + Sync + 'static {
    /// Fetches a fresh result.
    fn fetch(&self) -> impl Future<Output = Result<PollResult, ClientError>> + Send;
}

impl DataSource for EcocompteurClient {
    fn fetch(&self) -> impl Future<Output = Result<PollResult, ClientError>> + Send {
        self.fetch_poll_result()
    }
}

/// What subscribers see after each cycle.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    data: Option<Arc<PollResult>>,
    last_update_success: bool,
    last_error: Option<ClientError>,
    consecutive_failures: u32,
    cycles: u64,
}

impl CoordinatorState {
    /// Last successful result, if any cycle ever succeeded.
    #[must_use]
    pub fn data(&self) -> Option<&PollResult> {
        self.data.as_deref()
    }

    /// Whether the latest cycle succeeded.
    #[must_use]
    pub const fn last_update_success(&self) -> bool {
        self.last_update_success
    }

    /// Error of the latest cycle, cleared by the next success.
    #[must_use]
    pub const fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    /// Number of failed cycles since the last success.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Number of completed cycles, successful or not.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Data is present and the device has not failed `threshold` times in a row.
    #[must_use]
    pub const fn is_available(&self, threshold: u32) -> bool {
        self.data.is_some() && self.consecutive_failures < threshold
    }
}

/// Polls a [`DataSource`] and caches its last successful result.
pub struct Coordinator<S> {
    name: String,
    source: S,
    interval: Duration,
    failure_threshold: u32,
    state: watch::Sender<CoordinatorState>,
}

impl<S> fmt::Debug for Coordinator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("failure_threshold", &self.failure_threshold)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: DataSource> Coordinator<S> {
    /// Creates a coordinator polling every 5 seconds.
    #[must_use]
    pub fn new(name: impl Into<String>, source: S) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        Self {
            name: name.into(),
            source,
            interval: DEFAULT_SCAN_INTERVAL,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            state,
        }
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets how many consecutive failures make the data unavailable to sensors.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Name used in log messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Consecutive failures after which sensors report themselves unavailable.
    #[must_use]
    pub const fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Subscribes to cycle notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    /// Last successful result.
    #[must_use]
    pub fn data(&self) -> Option<Arc<PollResult>> {
        self.state.borrow().data.clone()
    }

    /// Runs one poll cycle and notifies subscribers.
    ///
    /// # Errors
    ///
    /// Will return the fetch error; the cached result is left untouched in that case.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        match self.source.fetch().await {
            Ok(result) => {
                let recovered = self.state.borrow().consecutive_failures > 0;
                self.state.send_modify(|state| {
                    state.data = Some(Arc::new(result));
                    state.last_update_success = true;
                    state.last_error = None;
                    state.consecutive_failures = 0;
                    state.cycles += 1;
                });
                if recovered {
                    tracing::info!("{}: fetching data recovered", self.name);
                }
                Ok(())
            }
            Err(e) => {
                let mut failures = 0;
                self.state.send_modify(|state| {
                    state.last_update_success = false;
                    state.last_error = Some(e.clone());
                    state.consecutive_failures += 1;
                    state.cycles += 1;
                    failures = state.consecutive_failures;
                });
                if failures == 1 {
                    tracing::warn!("{}: error fetching data: {e}", self.name);
                } else {
                    tracing::debug!("{}: error fetching data ({failures} in a row): {e}", self.name);
                }
                Err(e)
            }
        }
    }

    /// Initial refresh run during setup.
    ///
    /// # Errors
    ///
    /// Will return the fetch error, meaning the device is not ready and setup must not continue.
    pub async fn first_refresh(&self) -> Result<(), ClientError> {
        self.refresh().await.inspect_err(|e| {
            tracing::error!("{}: device not ready: {e}", self.name);
        })
    }

    /// Starts polling in the background, first tick one interval from now.
    ///
    /// Polling stops when the returned handle is dropped.
    pub fn spawn(self: Arc<Self>) -> CoordinatorHandle {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.refresh().await {
                    tracing::trace!("{}: cycle failed: {e}", self.name);
                }
            }
        });
        CoordinatorHandle { handle }
    }
}

/// Owns the background poll task.
#[derive(Debug)]
pub struct CoordinatorHandle {
    handle: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Stops polling; an in-flight request is abandoned.
    pub fn shutdown(self) {
        self.handle.abort();
    }

    /// Whether the poll task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{error::UnreachableReason, snapshot::tests::poll_fixture};
    use std::{collections::VecDeque, sync::Mutex};

    /// Replays scripted results, failing once the script runs out.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedSource {
        results: Mutex<VecDeque<Result<PollResult, ClientError>>>,
    }

    impl ScriptedSource {
        pub(crate) fn new(results: Vec<Result<PollResult, ClientError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
            }
        }
    }

    impl DataSource for ScriptedSource {
        async fn fetch(&self) -> Result<PollResult, ClientError> {
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(unreachable_error()))
        }
    }

    pub(crate) fn unreachable_error() -> ClientError {
        ClientError::DeviceUnreachable {
            url: "http://device/data.json".to_owned(),
            reason: UnreachableReason::Connect,
        }
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_previous_result() {
        let coordinator = Coordinator::new(
            "test",
            ScriptedSource::new(vec![Ok(poll_fixture()), Err(unreachable_error())]),
        );

        coordinator.refresh().await.unwrap();
        let first = coordinator.data().unwrap();

        let err = coordinator.refresh().await.unwrap_err();
        assert!(err.is_unreachable());

        let second = coordinator.data().unwrap();
        assert_eq!(*first, *second);
        assert_eq!(*second, poll_fixture());

        let state = coordinator.state();
        assert!(!state.last_update_success());
        assert_eq!(state.last_error(), Some(&unreachable_error()));
        assert_eq!(state.consecutive_failures(), 1);
        assert_eq!(state.cycles(), 2);
    }

    #[tokio::test]
    async fn test_success_replaces_result_and_clears_failures() {
        let mut updated = poll_fixture();
        updated.config.tariff_option = 1;
        let coordinator = Coordinator::new(
            "test",
            ScriptedSource::new(vec![
                Ok(poll_fixture()),
                Err(unreachable_error()),
                Ok(updated.clone()),
            ]),
        );

        coordinator.refresh().await.unwrap();
        coordinator.refresh().await.unwrap_err();
        coordinator.refresh().await.unwrap();

        let state = coordinator.state();
        assert_eq!(state.data(), Some(&updated));
        assert!(state.last_update_success());
        assert!(state.last_error().is_none());
        assert_eq!(state.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_are_notified_on_failure() {
        let coordinator = Coordinator::new("test", ScriptedSource::new(vec![Ok(poll_fixture())]));
        let mut rx = coordinator.subscribe();

        coordinator.refresh().await.unwrap();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        coordinator.refresh().await.unwrap_err();
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(!state.last_update_success());
        assert!(state.data().is_some());
    }

    #[tokio::test]
    async fn test_first_refresh_failure_is_reported() {
        let coordinator = Coordinator::new("test", ScriptedSource::default());
        coordinator.first_refresh().await.unwrap_err();
        assert!(coordinator.data().is_none());
        assert!(!coordinator.state().is_available(DEFAULT_FAILURE_THRESHOLD));
    }

    #[tokio::test]
    async fn test_availability_threshold() {
        let coordinator = Coordinator::new("test", ScriptedSource::new(vec![Ok(poll_fixture())]))
            .with_failure_threshold(2);
        coordinator.refresh().await.unwrap();
        assert!(coordinator.state().is_available(2));

        coordinator.refresh().await.unwrap_err();
        assert!(coordinator.state().is_available(2));

        coordinator.refresh().await.unwrap_err();
        assert!(!coordinator.state().is_available(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_coordinator_polls_on_interval() {
        let coordinator = Arc::new(
            Coordinator::new(
                "test",
                ScriptedSource::new(vec![Ok(poll_fixture()), Ok(poll_fixture())]),
            )
            .with_interval(Duration::from_secs(5)),
        );
        let mut rx = coordinator.subscribe();
        let started = Instant::now();
        let handle = Arc::clone(&coordinator).spawn();

        rx.changed().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(rx.borrow_and_update().cycles(), 1);

        rx.changed().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(rx.borrow_and_update().cycles(), 2);

        // Script exhausted: third cycle fails but the data stays.
        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.cycles(), 3);
        assert_eq!(state.data(), Some(&poll_fixture()));

        handle.shutdown();
    }
}
