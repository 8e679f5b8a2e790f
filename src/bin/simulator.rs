//! Serves a fake Ecocompteur on `SIMULATOR_ADDR` (default `0.0.0.0:80`).
use ecocompteur_client::simulator::{self, SimulatorState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:80";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::var("SIMULATOR_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_owned());
    let listener = TcpListener::bind(&addr).await?;

    tokio::select! {
        res = simulator::serve(listener, SimulatorState::default()) => res?,
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("Shutting down");
        }
    }
    Ok(())
}
