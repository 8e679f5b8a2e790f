//! Polls the configured Ecocompteur devices and logs their sensor states.
mod settings;

use std::time::Duration;

use ecocompteur_client::{
    config::{ConfigEntry, EntryStore},
    config_flow::ConfigFlow,
    error::ConfigFlowError,
    sensor::{Sensor, SensorState},
    setup::{setup_entry, SetupOptions},
};
use tokio::{sync::watch, task::JoinSet};
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

const SETUP_RETRY_DELAY: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load()?;
    let options = settings.setup_options();

    let mut store = EntryStore::load(&settings.storage_path)?;
    let flow = ConfigFlow::default().with_timeout(options.timeout);
    for device in &settings.devices {
        match flow.step_user(device.user_input(), &store).await {
            Ok(entry) => store.add(entry),
            Err(ConfigFlowError::AlreadyConfigured { .. }) => {}
            Err(e) => tracing::error!("Skipping {} ({}): {e}", device.host, e.key()),
        }
    }
    if store.is_dirty() {
        store.save()?;
    }
    if store.entries().is_empty() {
        tracing::warn!("No device configured in {}", settings.storage_path.display());
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();
    for entry in store.entries() {
        tasks.spawn(run_entry(entry.clone(), options, shutdown_rx.clone()));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    shutdown_tx.send_replace(true);
    while tasks.join_next().await.is_some() {}
    Ok(())
}

async fn run_entry(entry: ConfigEntry, options: SetupOptions, mut shutdown: watch::Receiver<bool>) {
    let mut runtime = loop {
        match setup_entry(&entry, &options).await {
            Ok(runtime) => break runtime,
            Err(e) => {
                tracing::warn!(
                    "{} not ready ({e}), retrying in {}s",
                    entry.host(),
                    SETUP_RETRY_DELAY.as_secs()
                );
                tokio::select! {
                    _ = shutdown.changed() => return,
                    () = tokio::time::sleep(SETUP_RETRY_DELAY) => {}
                }
            }
        }
    };
    log_sensors(runtime.entry_id(), runtime.sensors());

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            sensors = runtime.next_update() => match sensors {
                Some(sensors) => log_sensors(&entry.entry_id, sensors),
                None => break,
            },
        }
    }
    runtime.unload();
}

fn log_sensors(entry_id: &str, sensors: &[Sensor]) {
    for sensor in sensors {
        let state = sensor.state();
        let unit = SensorState::display_unit(sensor.description());
        match state.display_value(sensor.description()) {
            Some(value) if state.available => tracing::info!(
                entry_id,
                sensor = state.name.as_deref().unwrap_or(&state.unique_id),
                "{value} {unit}"
            ),
            _ => tracing::debug!(
                entry_id,
                sensor = state.name.as_deref().unwrap_or(&state.unique_id),
                "unavailable"
            ),
        }
    }
}
