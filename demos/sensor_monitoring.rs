//! Sensor monitoring example
//!
//! Polls an Ecocompteur every 5 seconds and prints the state of its 20 sensors after each cycle.
//!
//! Usage:
//! ```bash
//! cargo run --example sensor_monitoring -- <host[:port]>
//! # Example: cargo run --example sensor_monitoring -- 192.168.1.20
//! ```

use ecocompteur_client::{
    config::ConfigEntry,
    sensor::{Sensor, SensorState},
    setup::{setup_entry, SetupOptions},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <host[:port]>", args[0]);
        eprintln!("Example: {} 192.168.1.20", args[0]);
        std::process::exit(1);
    }
    let entry = ConfigEntry::new(&args[1], None);

    println!("Connecting to Ecocompteur at {}", entry.host());
    let mut runtime = setup_entry(&entry, &SetupOptions::default()).await?;
    println!("Connected, polling every {:?}", runtime.coordinator().interval());
    println!("Press Ctrl+C to stop\n");
    print_sensors(runtime.sensors());

    while let Some(sensors) = runtime.next_update().await {
        print_sensors(sensors);
    }
    Ok(())
}

fn print_sensors(sensors: &[Sensor]) {
    println!("=== {} sensors ===", sensors.len());
    for sensor in sensors {
        let state = sensor.state();
        let name = state.name.as_deref().unwrap_or(&state.unique_id);
        match state.display_value(sensor.description()) {
            Some(value) if state.available => {
                let unit = SensorState::display_unit(sensor.description());
                println!("[{name}] {value} {unit}");
            }
            _ => println!("[{name}] unavailable"),
        }
    }
    println!();
}
