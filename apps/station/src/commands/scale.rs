//! # Scale Commands
//!
//! Control of the serial scale owned by [`AppState`].
//!
//! ## Continuous Weighing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  start_weight_stream                                                    │
//! │       │  engine.start_continuous(callback)     sends C1                 │
//! │       ▼                                                                 │
//! │  reader task ── every line ──► callback ──► watch::Sender               │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │                               AppState::subscribe_readings()            │
//! │                                                                         │
//! │  stop_weight_stream              sends C0, drops the callback           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Connecting to another port always closes the current one first, so no
//! reading from the old port reaches subscribers after a switch.

use serde::Serialize;
use tracing::info;

use packing_scale::{ScaleError, ScaleErrorCode, ScaleReading, ScaleState};

use crate::error::{ApiError, CommandResult};
use crate::state::AppState;

/// Connection state as shown in the status bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleStatus {
    pub state: ScaleState,
    pub port: Option<String>,
    pub last_reading: Option<ScaleReading>,
}

pub async fn list_scale_ports(state: &AppState) -> CommandResult<Vec<String>> {
    Ok(state.scale().await.list_available_ports())
}

/// Opens `port` and remembers it (and the baud rate) in the settings.
///
/// Fails with `SCALE_ERROR` when the port cannot be opened.
pub async fn connect_scale(
    state: &AppState,
    port: &str,
    baud_rate: Option<u32>,
) -> CommandResult<ScaleStatus> {
    let port = port.trim();
    if port.is_empty() {
        return Err(ApiError::validation("Scale port is required"));
    }
    let baud_rate = baud_rate.unwrap_or(state.config().scale.baud_rate);

    let connected = state.scale().await.connect(port, baud_rate).await;
    if !connected {
        return Err(ScaleError::new(
            ScaleErrorCode::NotConnected,
            format!("Could not open scale port {port}"),
        )
        .into());
    }

    let db = state.db().await?;
    db.settings().set("scale_port", port).await?;
    db.settings()
        .set("scale_baud_rate", &baud_rate.to_string())
        .await?;

    info!(port = %port, baud = baud_rate, "Scale port selected");
    scale_status(state).await
}

pub async fn disconnect_scale(state: &AppState) -> CommandResult<()> {
    state.scale().await.disconnect().await;
    Ok(())
}

pub async fn scale_status(state: &AppState) -> CommandResult<ScaleStatus> {
    let scale = state.scale().await;
    Ok(ScaleStatus {
        state: scale.state(),
        port: scale.port().map(str::to_string),
        last_reading: scale.last_reading(),
    })
}

/// One reading: the next stable one when `stable`, otherwise whatever the
/// scale shows right now.
pub async fn read_weight(state: &AppState, stable: bool) -> CommandResult<ScaleReading> {
    let mut scale = state.scale().await;
    let reading = if stable {
        scale.get_stable().await?
    } else {
        scale.get_immediate().await?
    };
    Ok(reading)
}

/// Starts continuous mode; readings go to [`AppState::subscribe_readings`].
pub async fn start_weight_stream(state: &AppState) -> CommandResult<bool> {
    let publisher = state.reading_publisher();
    let started = state
        .scale()
        .await
        .start_continuous(move |reading| {
            publisher.send_replace(Some(reading));
        })
        .await;
    Ok(started)
}

pub async fn stop_weight_stream(state: &AppState) -> CommandResult<bool> {
    Ok(state.scale().await.stop_continuous().await)
}

pub async fn zero_scale(state: &AppState) -> CommandResult<bool> {
    Ok(state.scale().await.zero().await)
}

pub async fn tare_scale(state: &AppState) -> CommandResult<bool> {
    Ok(state.scale().await.tare().await)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::state::test_support::TestStation;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_status_when_disconnected() {
        let station = TestStation::start().await;

        let status = scale_status(&station.state).await.unwrap();
        assert_eq!(status.state, ScaleState::Disconnected);
        assert!(status.port.is_none());

        let err = read_weight(&station.state, false).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ScaleError);
        assert_eq!(err.scale_code, Some(ScaleErrorCode::NotConnected));
        assert!(!zero_scale(&station.state).await.unwrap());
        assert!(!start_weight_stream(&station.state).await.unwrap());
    }

    #[tokio::test]
    async fn test_connect_persists_port() {
        let station = TestStation::start().await;

        let status = connect_scale(&station.state, "COM3", Some(4800)).await.unwrap();
        assert_eq!(status.state, ScaleState::Idle);
        assert_eq!(status.port.as_deref(), Some("COM3"));

        let db = station.state.db().await.unwrap();
        assert_eq!(db.settings().get("scale_port").await.unwrap().as_deref(), Some("COM3"));
        assert_eq!(
            db.settings().get("scale_baud_rate").await.unwrap().as_deref(),
            Some("4800")
        );
        assert_eq!(list_scale_ports(&station.state).await.unwrap(), vec!["COM3"]);

        disconnect_scale(&station.state).await.unwrap();
        let status = scale_status(&station.state).await.unwrap();
        assert_eq!(status.state, ScaleState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_unknown_port_fails() {
        let station = TestStation::start().await;

        let err = connect_scale(&station.state, "COM9", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ScaleError);
        assert_eq!(err.scale_code, Some(ScaleErrorCode::NotConnected));

        let db = station.state.db().await.unwrap();
        assert_eq!(db.settings().get("scale_port").await.unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_stream_publishes_readings() {
        let station = TestStation::start_with(|c| c.scale.port = Some("COM3".into())).await;
        let mut device = station.ports.device("COM3").unwrap();
        let mut readings = station.state.subscribe_readings();

        assert!(start_weight_stream(&station.state).await.unwrap());
        let mut command = [0u8; 4];
        device.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, b"C1\r\n");

        device.write_all(b"U _ +     0.750 kg\r\n").await.unwrap();
        readings.changed().await.unwrap();
        let reading = readings.borrow_and_update().clone().unwrap();
        assert_eq!(reading.value, 0.75);
        assert!(!reading.stable);

        let status = scale_status(&station.state).await.unwrap();
        assert_eq!(status.state, ScaleState::Continuous);

        assert!(stop_weight_stream(&station.state).await.unwrap());
        device.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, b"C0\r\n");
    }

    #[tokio::test]
    async fn test_zero_and_tare_write_commands() {
        let station = TestStation::start_with(|c| c.scale.port = Some("COM3".into())).await;
        let mut device = station.ports.device("COM3").unwrap();

        assert!(zero_scale(&station.state).await.unwrap());
        assert!(tare_scale(&station.state).await.unwrap());

        let mut sent = [0u8; 6];
        device.read_exact(&mut sent).await.unwrap();
        assert_eq!(&sent, b"Z\r\nT\r\n");
    }
}
