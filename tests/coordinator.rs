#![cfg(feature = "simulator")]
mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::MockServer;
use ecocompteur_client::{
    config::ConfigEntry,
    setup::{setup_entry, SetupOptions},
    Coordinator, EcocompteurClient,
};

#[tokio::test]
async fn test_outage_keeps_cached_result() {
    let server = MockServer::start().await;
    let client = EcocompteurClient::builder()
        .host(&server.host())
        .build()
        .unwrap();
    let coordinator = Coordinator::new("simulator", client);

    coordinator.first_refresh().await.unwrap();
    let before = coordinator.data().unwrap();

    server.state.set_fault(Some(StatusCode::INTERNAL_SERVER_ERROR));
    let err = coordinator.refresh().await.unwrap_err();
    assert!(err.is_unreachable());
    assert_eq!(coordinator.data().unwrap().config, before.config);
    assert_eq!(coordinator.state().consecutive_failures(), 1);

    server.state.set_fault(None);
    coordinator.refresh().await.unwrap();
    assert!(coordinator.state().last_update_success());
}

#[tokio::test]
async fn test_entry_setup_against_simulator() {
    let server = MockServer::start().await;
    let entry = ConfigEntry::new(&server.host(), Some("Simulated"));
    let options = SetupOptions {
        scan_interval: Duration::from_millis(100),
        failure_threshold: 1,
        ..SetupOptions::default()
    };
    let mut runtime = setup_entry(&entry, &options).await.unwrap();
    assert_eq!(runtime.sensors().len(), 20);
    assert_eq!(runtime.device_info().name, "Simulated");

    server.state.set_fault(Some(StatusCode::SERVICE_UNAVAILABLE));
    let sensors = runtime.next_update().await.unwrap();
    assert!(sensors.iter().all(|sensor| !sensor.state().available));
    assert!(runtime.coordinator().data().is_some());

    runtime.unload();
}

#[tokio::test]
async fn test_entry_setup_fails_when_device_down() {
    let server = MockServer::start().await;
    server.state.set_fault(Some(StatusCode::SERVICE_UNAVAILABLE));
    let entry = ConfigEntry::new(&server.host(), None);

    let err = setup_entry(&entry, &SetupOptions::default()).await.unwrap_err();
    assert!(err.is_unreachable());
}
