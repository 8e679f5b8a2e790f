//! Log download example
//!
//! Fetches the hourly (`log1.csv`) and daily (`log2.csv`) logs of an Ecocompteur and prints them.
//!
//! Usage:
//! ```bash
//! cargo run --example fetch_logs -- <host[:port]>
//! ```

use ecocompteur_client::EcocompteurClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <host[:port]>", args[0]);
        std::process::exit(1);
    }

    let client = EcocompteurClient::builder().host(&args[1]).build()?;

    println!("=== Hourly log ===");
    print!("{}", client.fetch_log1().await?);
    println!("\n=== Daily log ===");
    print!("{}", client.fetch_log2().await?);
    Ok(())
}
