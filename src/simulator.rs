//! Fake Ecocompteur serving the same endpoints as the real device.
//!
//! `data.json` and the CSV logs are fixed; `inst.json` varies on every request. A fault can be injected
//! to make every endpoint answer with a given status code.
//!
//! Requires the `simulator` feature to be enabled.
//!
//! # Usage:
//! ```rust,no_run
//! use ecocompteur_client::simulator::{self, SimulatorState};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     simulator::serve(listener, SimulatorState::default()).await
//! }
//! ```
use std::sync::{
    atomic::{AtomicU16, Ordering},
    Arc,
};

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const LOG1_CSV: &str = "\
Date,Heure,Circuit1,Circuit2,Circuit3,Circuit4,Circuit5,TIC1,TIC2,TIC3,TIC4,TIC5,TIC6
2026-02-13,00:00,123.45,45.67,23.45,12.34,56.78,1.23,2.34,3.45,4.56,5.67,6.78
2026-02-13,01:00,134.56,46.78,24.56,13.45,57.89,1.34,2.45,3.56,4.67,5.78,6.89
2026-02-13,02:00,125.67,44.56,22.34,11.23,55.67,1.25,2.36,3.47,4.58,5.69,6.70
2026-02-13,03:00,115.78,42.34,20.12,10.11,53.45,1.15,2.26,3.37,4.48,5.59,6.60
2026-02-13,04:00,120.89,43.45,21.23,11.34,54.56,1.20,2.31,3.42,4.53,5.64,6.75
";

const LOG2_CSV: &str = "\
Date,Circuit1_Total,Circuit2_Total,Circuit3_Total,Circuit4_Total,Circuit5_Total,Water_Total,Gas_Total
2026-02-01,3456.78,1234.56,567.89,234.56,890.12,123.45,45.67
2026-02-02,3478.90,1245.67,578.90,245.67,901.23,124.56,46.78
2026-02-03,3501.23,1256.78,589.01,256.78,912.34,125.67,47.89
2026-02-04,3523.45,1267.89,600.12,267.89,923.45,126.78,48.90
2026-02-05,3545.67,1278.90,611.23,278.90,934.56,127.89,49.01
";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Ecocompteur API Simulator</title>
    <style>
        body { font-family: Arial, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        .endpoint { background: #f4f4f4; padding: 10px; margin: 10px 0; border-radius: 5px; }
        a { color: #0066cc; text-decoration: none; }
    </style>
</head>
<body>
    <h1>Ecocompteur API Simulator</h1>
    <p>Serves the Ecocompteur API for testing purposes.</p>
    <h2>Available Endpoints:</h2>
    <div class="endpoint"><strong><a href="/data.json">/data.json</a></strong> - General configuration and consumption data</div>
    <div class="endpoint"><strong><a href="/inst.json">/inst.json</a></strong> - Real-time instantaneous data (updates dynamically)</div>
    <div class="endpoint"><strong><a href="/log1.csv">/log1.csv</a></strong> - Hourly statistics (CSV format)</div>
    <div class="endpoint"><strong><a href="/log2.csv">/log2.csv</a></strong> - Daily statistics (CSV format)</div>
</body>
</html>
"#;

/// Shared simulator state.
#[derive(Debug, Clone, Default)]
pub struct SimulatorState {
    fault: Arc<AtomicU16>,
}

impl SimulatorState {
    /// Makes every endpoint answer `status`, or restores normal answers with `None`.
    pub fn set_fault(&self, status: Option<StatusCode>) {
        let code = status.map_or(0, |status| status.as_u16());
        self.fault.store(code, Ordering::SeqCst);
    }

    /// Currently injected fault.
    #[must_use]
    pub fn fault(&self) -> Option<StatusCode> {
        match self.fault.load(Ordering::SeqCst) {
            0 => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }
}

/// Builds the simulator routes.
pub fn router(state: SimulatorState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/data.json", get(data_json))
        .route("/inst.json", get(inst_json))
        .route("/log1.csv", get(log1_csv))
        .route("/log2.csv", get(log2_csv))
        .layer(middleware::from_fn_with_state(state.clone(), inject_fault))
        .with_state(state)
}

/// Serves the simulator until the listener fails.
///
/// # Errors
///
/// Will return an error if the server cannot accept connections.
pub async fn serve(listener: TcpListener, state: SimulatorState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Ecocompteur simulator listening on {addr}");
    }
    axum::serve(listener, router(state)).await
}

async fn inject_fault(State(state): State<SimulatorState>, request: Request, next: Next) -> Response {
    match state.fault() {
        Some(status) => {
            tracing::debug!("Injected {status} for {}", request.uri());
            status.into_response()
        }
        None => next.run(request).await,
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn data_json() -> Json<Value> {
    Json(data_fixture())
}

async fn inst_json() -> Json<Value> {
    Json(instant_readings(Utc::now()))
}

async fn log1_csv() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/csv")], LOG1_CSV)
}

async fn log2_csv() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/csv")], LOG2_CSV)
}

/// Fixed `data.json` payload: five named power circuits, one water counter, five disabled pulse inputs.
#[must_use]
pub fn data_fixture() -> Value {
    crate::snapshot::sample_payload()
}

/// Randomized `inst.json` payload stamped with `now`.
#[must_use]
pub fn instant_readings(now: DateTime<Utc>) -> Value {
    let mut rng = rand::thread_rng();
    let water = round(rng.gen_range(60.0..70.0), 6);
    json!({
        "data1": round(200.0 + rng.gen_range(-50.0..100.0), 2),
        "data2": round(rng.gen_range(0.0..50.0), 2),
        "data3": round(rng.gen_range(0.0..30.0), 2),
        "data4": round(rng.gen_range(0.0..20.0), 2),
        "data5": round(rng.gen_range(50.0..100.0), 2),
        "data6": water,
        "data6m3": water,
        "data7": 0.0,
        "data7m3": 0.0,
        "heure": now.hour(),
        "minute": now.minute(),
        "CIR1_Nrj": round(rng.gen_range(0.0..10.0), 6),
        "CIR1_Vol": round(rng.gen_range(0.0..5.0), 6),
        "CIR2_Nrj": 0.0,
        "CIR2_Vol": 0.0,
        "CIR3_Nrj": 0.0,
        "CIR3_Vol": 0.0,
        "CIR4_Nrj": 0.0,
        "CIR4_Vol": 0.0,
        "Date_Time": now.timestamp(),
    })
}

fn round(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_readings_time_fields() {
        // 2024-10-02T10:40:42Z
        let now = DateTime::from_timestamp(1_727_865_642, 0).unwrap();
        let readings = instant_readings(now);
        assert_eq!(readings["heure"], 10);
        assert_eq!(readings["minute"], 40);
        assert_eq!(readings["Date_Time"], 1_727_865_642_i64);
        assert_eq!(readings.as_object().unwrap().len(), 20);
    }

    #[test]
    fn test_instant_readings_at_end_of_day() {
        let now = "2024-12-31T23:59:59Z".parse::<DateTime<Utc>>().unwrap();
        let readings = instant_readings(now);
        assert_eq!(readings["heure"], 23);
        assert_eq!(readings["minute"], 59);
        assert_eq!(readings["Date_Time"], 1_735_689_599_i64);
    }

    #[test]
    fn test_instant_readings_ranges() {
        let readings = instant_readings(Utc::now());
        let power = readings["data1"].as_f64().unwrap();
        assert!((150.0..=300.0).contains(&power), "{power}");
        assert_eq!(readings["data6"], readings["data6m3"]);
    }

    #[test]
    fn test_fault_injection_state() {
        let state = SimulatorState::default();
        assert_eq!(state.fault(), None);
        state.set_fault(Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(state.clone().fault(), Some(StatusCode::SERVICE_UNAVAILABLE));
        state.set_fault(None);
        assert_eq!(state.fault(), None);
    }

    #[test]
    fn test_csv_headers() {
        assert!(LOG1_CSV.starts_with("Date,Heure,Circuit1,"));
        assert!(LOG2_CSV.starts_with("Date,Circuit1_Total,"));
        assert_eq!(LOG1_CSV.lines().count(), 6);
    }
}
