//! # Application State
//!
//! The composition root: one store and one scale engine per station.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppState                                                               │
//! │  ├── config    StationConfig       read-only after startup              │
//! │  ├── store     Store               init() once, close() on shutdown     │
//! │  ├── scale     Mutex<ScaleEngine>  one request at a time                │
//! │  └── readings  watch channel       latest continuous reading            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Commands borrow the state; nothing here is global.

use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{info, warn};

use packing_db::{Database, DbResult, Store};
use packing_scale::{ScaleEngine, ScaleReading, SerialPortProvider, SystemSerialPorts};

use crate::config::StationConfig;

/// Shared state behind every command.
pub struct AppState {
    config: StationConfig,
    store: Store,
    scale: Mutex<ScaleEngine>,
    readings: watch::Sender<Option<ScaleReading>>,
}

impl AppState {
    /// State using the host's serial ports.
    pub fn new(config: StationConfig) -> Self {
        Self::with_ports(config, Arc::new(SystemSerialPorts))
    }

    /// State using the given serial port source.
    pub fn with_ports(config: StationConfig, ports: Arc<dyn SerialPortProvider>) -> Self {
        let store = Store::new(config.db_config());
        let scale = ScaleEngine::new(ports, config.scale.clone());
        let (readings, _) = watch::channel(None);

        AppState {
            config,
            store,
            scale: Mutex::new(scale),
            readings,
        }
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The open database; `NotInitialized` before [`startup`](Self::startup).
    pub async fn db(&self) -> DbResult<Database> {
        self.store.database().await
    }

    /// Exclusive access to the scale engine.
    pub async fn scale(&self) -> MutexGuard<'_, ScaleEngine> {
        self.scale.lock().await
    }

    /// Receives every reading published in continuous mode.
    pub fn subscribe_readings(&self) -> watch::Receiver<Option<ScaleReading>> {
        self.readings.subscribe()
    }

    pub(crate) fn reading_publisher(&self) -> watch::Sender<Option<ScaleReading>> {
        self.readings.clone()
    }

    /// Opens the store, then connects the configured scale.
    ///
    /// A store failure is fatal. A scale that cannot be opened is logged
    /// and the station runs without it.
    pub async fn startup(&self) -> DbResult<()> {
        let db = self.store.init().await?;
        info!(path = ?self.config.database_path(), "Store ready");

        let Some(port) = self.configured_port(&db).await else {
            info!("No scale port configured");
            return Ok(());
        };

        let baud_rate = self.config.scale.baud_rate;
        if self.scale().await.connect(&port, baud_rate).await {
            info!(port = %port, baud = baud_rate, "Scale connected");
        } else {
            warn!(port = %port, "Scale not available; continuing without it");
        }

        Ok(())
    }

    /// Disconnects the scale and closes the store.
    pub async fn shutdown(&self) -> DbResult<()> {
        self.scale().await.disconnect().await;
        self.store.close().await?;
        info!("Station shut down");
        Ok(())
    }

    /// `[scale] port` from the config, else the `scale_port` setting.
    async fn configured_port(&self, db: &Database) -> Option<String> {
        if let Some(port) = &self.config.scale.port {
            return Some(port.clone());
        }

        match db.settings().get("scale_port").await {
            Ok(port) => port.filter(|p| !p.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read scale_port setting");
                None
            }
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Test Support
// =============================================================================


#[cfg(test)]
mod tests {
    use super::test_support::TestStation;
    use super::*;
    use packing_db::DbError;

    #[tokio::test]
    async fn test_startup_without_scale() {
        let station = TestStation::start().await;

        assert!(station.state.store().is_initialized().await);
        assert!(!station.state.scale().await.is_connected());
    }

    #[tokio::test]
    async fn test_startup_connects_configured_scale() {
        let station = TestStation::start_with(|c| c.scale.port = Some("COM3".into())).await;

        let scale = station.state.scale().await;
        assert!(scale.is_connected());
        assert_eq!(scale.port(), Some("COM3"));
    }

    #[tokio::test]
    async fn test_startup_survives_missing_scale() {
        let station = TestStation::start_with(|c| c.scale.port = Some("COM9".into())).await;

        assert!(station.state.store().is_initialized().await);
        assert!(!station.state.scale().await.is_connected());
    }

    #[tokio::test]
    async fn test_shutdown_closes_store() {
        let station = TestStation::start().await;
        station.state.shutdown().await.unwrap();

        let err = station.state.db().await.unwrap_err();
        assert!(matches!(err, DbError::NotInitialized));
    }
}
