#![cfg(feature = "simulator")]
mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::MockServer;
use ecocompteur_client::{
    config::EntryStore,
    config_flow::{ConfigFlow, UserInput},
    error::ConfigFlowError,
    DEFAULT_NAME,
};

fn store(name: &str) -> EntryStore {
    let path = std::env::temp_dir().join(format!("ecocompteur-flow-{name}-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);
    EntryStore::load(path).unwrap()
}

fn input(host: String) -> UserInput {
    UserInput { host, name: None }
}

#[tokio::test]
async fn test_user_step_creates_entry() {
    let server = MockServer::start().await;
    let mut store = store("create");

    let entry = ConfigFlow::default()
        .step_user(input(server.host()), &store)
        .await
        .unwrap();
    assert_eq!(entry.host(), server.host());
    assert_eq!(entry.name(), DEFAULT_NAME);

    store.add(entry);
    let err = ConfigFlow::default()
        .step_user(input(server.host()), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigFlowError::AlreadyConfigured { .. }), "{err:?}");
    assert_eq!(err.key(), "already_configured");
}

#[tokio::test]
async fn test_user_step_cannot_connect() {
    let server = MockServer::start().await;
    server.state.set_fault(Some(StatusCode::NOT_FOUND));

    let err = ConfigFlow::default()
        .with_timeout(Duration::from_secs(1))
        .step_user(input(server.host()), &store("fault"))
        .await
        .unwrap_err();
    assert_eq!(err.key(), "cannot_connect");
}

#[tokio::test]
async fn test_user_step_invalid_host() {
    let err = ConfigFlow::default()
        .step_user(input("not a host".to_owned()), &store("invalid"))
        .await
        .unwrap_err();
    assert_eq!(err.key(), "invalid_host");
}
