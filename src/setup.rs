//! Wiring of a config entry: client, coordinator, sensors and the background poll task.
use std::{sync::Arc, time::Duration};

use tokio::sync::watch;

use crate::{
    config::ConfigEntry,
    coordinator::{Coordinator, CoordinatorHandle, CoordinatorState, DataSource},
    error::ClientError,
    sensor::{sensors_for_entry, DeviceInfo, Sensor},
    EcocompteurClient, DEFAULT_FAILURE_THRESHOLD, DEFAULT_SCAN_INTERVAL, DEFAULT_TIMEOUT,
};

/// Tunables applied to every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOptions {
    pub scan_interval: Duration,
    pub timeout: Duration,
    pub failure_threshold: u32,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

/// Sets up a config entry against the real device.
///
/// # Errors
///
/// Will return an error if the first refresh fails; the entry should be retried later.
pub async fn setup_entry(
    entry: &ConfigEntry,
    options: &SetupOptions,
) -> Result<DeviceRuntime<EcocompteurClient>, ClientError> {
    let client = EcocompteurClient::builder()
        .host(entry.host())
        .timeout(options.timeout)
        .build()?;
    let coordinator = Coordinator::new(format!("{} ({})", entry.name(), entry.host()), client)
        .with_interval(options.scan_interval)
        .with_failure_threshold(options.failure_threshold);
    DeviceRuntime::start(&entry.entry_id, entry.name(), coordinator).await
}

/// A running config entry.
#[derive(Debug)]
pub struct DeviceRuntime<S> {
    entry_id: String,
    device_info: DeviceInfo,
    coordinator: Arc<Coordinator<S>>,
    updates: watch::Receiver<CoordinatorState>,
    sensors: Vec<Sensor>,
    poller: CoordinatorHandle,
}

impl<S: DataSource> DeviceRuntime<S> {
    /// Runs the first refresh, creates the sensors and starts polling.
    ///
    /// # Errors
    ///
    /// Will return the error of the first refresh.
    pub async fn start(
        entry_id: &str,
        name: &str,
        coordinator: Coordinator<S>,
    ) -> Result<Self, ClientError> {
        coordinator.first_refresh().await?;

        let coordinator = Arc::new(coordinator);
        let mut updates = coordinator.subscribe();
        let mut sensors = sensors_for_entry(entry_id);
        let state = updates.borrow_and_update().clone();
        for sensor in &mut sensors {
            sensor.handle_update(&state, coordinator.failure_threshold());
        }
        let poller = Arc::clone(&coordinator).spawn();
        tracing::info!(
            "Set up {name} ({entry_id}) with {} sensors",
            sensors.len()
        );

        Ok(Self {
            entry_id: entry_id.to_owned(),
            device_info: DeviceInfo::new(entry_id, name),
            coordinator,
            updates,
            sensors,
            poller,
        })
    }

    #[must_use]
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    #[must_use]
    pub const fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    #[must_use]
    pub fn coordinator(&self) -> &Coordinator<S> {
        &self.coordinator
    }

    /// Sensors with the state of the last handled cycle.
    #[must_use]
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Waits for the next coordinator cycle and updates every sensor.
    ///
    /// Returns `None` once polling has stopped.
    pub async fn next_update(&mut self) -> Option<&[Sensor]> {
        self.updates.changed().await.ok()?;
        let state = self.updates.borrow_and_update().clone();
        let threshold = self.coordinator.failure_threshold();
        for sensor in &mut self.sensors {
            sensor.handle_update(&state, threshold);
        }
        Some(&self.sensors)
    }

    /// Stops polling.
    pub fn unload(self) {
        tracing::info!("Unloading {}", self.entry_id);
        self.poller.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        coordinator::tests::{unreachable_error, ScriptedSource},
        snapshot::tests::poll_fixture,
    };

    #[tokio::test]
    async fn test_start_fails_when_device_not_ready() {
        let coordinator = Coordinator::new("test", ScriptedSource::default());
        let err = DeviceRuntime::start("entry", "Ecocompteur", coordinator)
            .await
            .unwrap_err();
        assert_eq!(err, unreachable_error());
    }

    #[tokio::test]
    async fn test_start_publishes_initial_states() {
        let coordinator = Coordinator::new("test", ScriptedSource::new(vec![Ok(poll_fixture())]));
        let runtime = DeviceRuntime::start("entry", "Garage", coordinator)
            .await
            .unwrap();

        assert_eq!(runtime.sensors().len(), 20);
        assert_eq!(runtime.device_info().name, "Garage");
        let names: Vec<_> = runtime
            .sensors()
            .iter()
            .filter_map(|sensor| sensor.state().name.as_deref())
            .collect();
        assert_eq!(names[0], "BASE");
        assert_eq!(names[9], "Consommation globale");
        let disabled = runtime
            .sensors()
            .iter()
            .filter(|sensor| !sensor.state().available)
            .count();
        assert_eq!(disabled, 5);
        runtime.unload();
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_update_follows_the_coordinator() {
        let coordinator = Coordinator::new(
            "test",
            ScriptedSource::new(vec![Ok(poll_fixture()), Err(unreachable_error())]),
        )
        .with_interval(Duration::from_secs(5))
        .with_failure_threshold(1);
        let mut runtime = DeviceRuntime::start("entry", "Garage", coordinator)
            .await
            .unwrap();

        let sensors = runtime.next_update().await.unwrap();
        assert!(sensors.iter().all(|sensor| !sensor.state().available));
        assert_eq!(
            runtime.coordinator().data().as_deref(),
            Some(&poll_fixture())
        );
    }
}
