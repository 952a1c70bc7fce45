//! # Packing Station Entry Point
//!
//! Headless run of the station:
//!
//! 1. Initialize tracing (logging)
//! 2. Load `station.toml` and environment overrides
//! 3. Open the store (bootstrap schema, run migrations)
//! 4. List serial ports and, if a scale is configured, print a stable reading
//! 5. Close the store
//!
//! Every result is printed as the JSON envelope the UI receives.

use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;

use packing_station_lib::commands::{scale, settings};
use packing_station_lib::{init_tracing, start, IpcResponse, StationConfig};

fn print<T: Serialize>(label: &str, response: IpcResponse<T>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&response)
        .with_context(|| format!("failed to serialize {label}"))?;
    println!("{label}: {json}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = StationConfig::load(config_path).context("failed to load station config")?;
    tracing::info!(database = ?config.database_path(), "Starting packing station");

    let state = start(config).await.context("failed to start station")?;

    print("ports", IpcResponse::from(scale::list_scale_ports(&state).await))?;
    print("settings", IpcResponse::from(settings::get_settings(&state).await))?;

    let status = scale::scale_status(&state).await;
    let connected = status.as_ref().is_ok_and(|s| s.port.is_some());
    print("scale", IpcResponse::from(status))?;
    if connected {
        print("reading", IpcResponse::from(scale::read_weight(&state, true).await))?;
    }

    state.shutdown().await.context("failed to close the store")?;
    Ok(())
}
