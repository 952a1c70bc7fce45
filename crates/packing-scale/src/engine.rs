//! # Scale Engine
//!
//! Owns the serial connection and turns commands into readings.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         One Request (SI / S)                            │
//! │                                                                         │
//! │  get_stable()                         reader task                       │
//! │  ────────────                         ───────────                       │
//! │  1. pending = {id, stable, tx}        read line ──► parse_response      │
//! │  2. write "S\r\n"                          │                            │
//! │  3. timeout(ceiling, rx) ◄───── tx.send ───┤ reading satisfies pending? │
//! │         │                                  │ '!' line? → SCALE_ERROR    │
//! │         │ elapsed                          └─► callback (continuous)    │
//! │         ▼                                                               │
//! │  4. clear pending if still ours → TIMEOUT                               │
//! │                                                                         │
//! │  Whichever of reply and ceiling comes first wins; the slot is cleared  │
//! │  either way, so a late reply never completes the next request.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## States
//! ```text
//!   Disconnected ──connect()──► Idle ──start_continuous()──► Continuous
//!        ▲                       │ ◄──stop_continuous()────────┘
//!        └────disconnect()───────┴─────────────────────────────┘
//! ```
//! `Connecting` and `AwaitingResponse` only exist inside `connect` and the
//! request methods. Both take `&mut self`, so no caller can observe them.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ScaleConfig;
use crate::error::{ScaleError, ScaleErrorCode, ScaleResult};
use crate::protocol::{parse_response, ScaleCommand, ScaleReading};
use crate::transport::{SerialIo, SerialPortProvider, SerialSettings, SystemSerialPorts};

/// Receives every reading parsed while continuous mode is on.
pub type ReadingCallback = Arc<dyn Fn(ScaleReading) + Send + Sync>;

// =============================================================================
// Engine State
// =============================================================================

/// Externally visible state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleState {
    Disconnected,
    Idle,
    Continuous,
}

impl std::fmt::Display for ScaleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleState::Disconnected => write!(f, "disconnected"),
            ScaleState::Idle => write!(f, "idle"),
            ScaleState::Continuous => write!(f, "continuous"),
        }
    }
}

/// The request waiting for a reply.
struct Pending {
    id: u64,
    require_stable: bool,
    tx: oneshot::Sender<ScaleResult<ScaleReading>>,
}

/// State shared between the engine and its reader task.
#[derive(Default)]
struct Shared {
    last_reading: Option<ScaleReading>,
    pending: Option<Pending>,
    callback: Option<ReadingCallback>,
    /// Set by the reader task when the port stops delivering data.
    closed: bool,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An open port: write half plus the task draining the read half.
struct Link {
    port: String,
    writer: WriteHalf<Box<dyn SerialIo>>,
    reader: JoinHandle<()>,
}

// =============================================================================
// Scale Engine
// =============================================================================

/// Driver for one scale on one serial port.
///
/// ## Usage
/// ```rust,ignore
/// let mut scale = ScaleEngine::system(ScaleConfig::default());
///
/// if scale.connect("COM3", 9600).await {
///     let reading = scale.get_stable().await?;
///     println!("{} {}", reading.value, reading.unit);
/// }
///
/// scale.disconnect().await;
/// ```
pub struct ScaleEngine {
    provider: Arc<dyn SerialPortProvider>,
    config: ScaleConfig,
    shared: Arc<Mutex<Shared>>,
    link: Option<Link>,
    continuous: bool,
    next_request: u64,
}

impl ScaleEngine {
    pub fn new(provider: Arc<dyn SerialPortProvider>, config: ScaleConfig) -> Self {
        ScaleEngine {
            provider,
            config,
            shared: Arc::new(Mutex::new(Shared::default())),
            link: None,
            continuous: false,
            next_request: 0,
        }
    }

    /// Engine over the host's serial ports.
    pub fn system(config: ScaleConfig) -> Self {
        ScaleEngine::new(Arc::new(SystemSerialPorts), config)
    }

    pub fn config(&self) -> &ScaleConfig {
        &self.config
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Lists serial ports. Enumeration failures are logged, never returned.
    pub fn list_available_ports(&self) -> Vec<String> {
        match self.provider.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate serial ports");
                Vec::new()
            }
        }
    }

    /// Opens `port`, closing any current connection first.
    ///
    /// Returns false if the port cannot be opened; the engine is then
    /// disconnected.
    pub async fn connect(&mut self, port: &str, baud_rate: u32) -> bool {
        self.disconnect().await;

        let settings = SerialSettings::new(port, baud_rate);
        let stream = match self.provider.open(&settings) {
            Ok(stream) => stream,
            Err(e) => {
                error!(port = %port, error = %e, "Failed to open scale port");
                return false;
            }
        };

        lock(&self.shared).closed = false;
        let (read_half, writer) = tokio::io::split(stream);
        let reader = tokio::spawn(read_loop(
            read_half,
            self.shared.clone(),
            port.to_string(),
        ));

        self.link = Some(Link {
            port: port.to_string(),
            writer,
            reader,
        });

        info!(port = %port, baud = baud_rate, "Scale connected");
        true
    }

    /// Closes the connection. Safe to call when not connected.
    ///
    /// Leaves continuous mode first, then stops the reader task and waits for
    /// it before the port is released. Clears the last reading and the
    /// callback.
    pub async fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            let Link {
                port,
                mut writer,
                reader,
            } = link;

            let closed = lock(&self.shared).closed;
            if self.continuous && !closed {
                if let Err(e) = write_command(&mut writer, ScaleCommand::ContinuousOff).await {
                    warn!(port = %port, error = %e, "Failed to stop continuous mode");
                }
            }

            reader.abort();
            let _ = reader.await;
            drop(writer);

            info!(port = %port, "Scale disconnected");
        }

        self.continuous = false;

        let mut shared = lock(&self.shared);
        shared.last_reading = None;
        shared.pending = None;
        shared.callback = None;
    }

    /// False once the port is closed or has stopped delivering data.
    pub fn is_connected(&self) -> bool {
        self.live_link().is_some()
    }

    /// Port of the open connection.
    pub fn port(&self) -> Option<&str> {
        self.live_link().map(|link| link.port.as_str())
    }

    pub fn state(&self) -> ScaleState {
        match (self.live_link(), self.continuous) {
            (None, _) => ScaleState::Disconnected,
            (Some(_), false) => ScaleState::Idle,
            (Some(_), true) => ScaleState::Continuous,
        }
    }

    /// The link, unless its reader task has ended.
    fn live_link(&self) -> Option<&Link> {
        self.link.as_ref().filter(|_| !lock(&self.shared).closed)
    }

    // =========================================================================
    // Readings
    // =========================================================================

    /// Current reading, stable or not (`SI`).
    pub async fn get_immediate(&mut self) -> ScaleResult<ScaleReading> {
        let ceiling = self.config.immediate_ceiling();
        self.request(ScaleCommand::Immediate, false, ceiling).await
    }

    /// Next stable reading (`S`). Unstable lines do not end the wait.
    pub async fn get_stable(&mut self) -> ScaleResult<ScaleReading> {
        let ceiling = self.config.stable_ceiling();
        self.request(ScaleCommand::Stable, true, ceiling).await
    }

    /// Most recent reading received on this connection.
    pub fn last_reading(&self) -> Option<ScaleReading> {
        lock(&self.shared).last_reading.clone()
    }

    async fn request(
        &mut self,
        command: ScaleCommand,
        require_stable: bool,
        ceiling: Duration,
    ) -> ScaleResult<ScaleReading> {
        if self.link.is_none() {
            return Err(ScaleError::not_connected());
        }

        self.next_request += 1;
        let id = self.next_request;
        let (tx, rx) = oneshot::channel();

        {
            let mut shared = lock(&self.shared);
            if shared.closed {
                return Err(ScaleError::not_connected());
            }
            shared.last_reading = None;
            shared.pending = Some(Pending {
                id,
                require_stable,
                tx,
            });
        }

        if let Err(e) = self.send(command).await {
            self.clear_pending(id);
            return Err(e);
        }

        match timeout(ceiling, rx).await {
            Ok(Ok(result)) => result,
            // Reader task ended and dropped the request.
            Ok(Err(_)) => Err(ScaleError::not_connected()),
            Err(_) => {
                self.clear_pending(id);
                warn!(
                    command = %command,
                    ceiling_ms = ceiling.as_millis() as u64,
                    "Scale request timed out"
                );
                Err(ScaleError::timeout(ceiling.as_millis()))
            }
        }
    }

    fn clear_pending(&self, id: u64) {
        let mut shared = lock(&self.shared);
        if shared.pending.as_ref().is_some_and(|p| p.id == id) {
            shared.pending = None;
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Streams readings to `callback` until [`stop_continuous`](Self::stop_continuous).
    ///
    /// Replaces any previous callback.
    pub async fn start_continuous<F>(&mut self, callback: F) -> bool
    where
        F: Fn(ScaleReading) + Send + Sync + 'static,
    {
        if !self.is_connected() {
            return false;
        }

        lock(&self.shared).callback = Some(Arc::new(callback));

        match self.send(ScaleCommand::ContinuousOn).await {
            Ok(()) => {
                self.continuous = true;
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to start continuous mode");
                lock(&self.shared).callback = None;
                false
            }
        }
    }

    pub async fn stop_continuous(&mut self) -> bool {
        if self.link.is_none() {
            return false;
        }

        let sent = self.send(ScaleCommand::ContinuousOff).await.is_ok();
        self.continuous = false;
        lock(&self.shared).callback = None;
        sent
    }

    /// Zeroes the scale. True when the command was written.
    pub async fn zero(&mut self) -> bool {
        self.send(ScaleCommand::Zero).await.is_ok()
    }

    /// Tares the scale. True when the command was written.
    pub async fn tare(&mut self) -> bool {
        self.send(ScaleCommand::Tare).await.is_ok()
    }

    async fn send(&mut self, command: ScaleCommand) -> ScaleResult<()> {
        if lock(&self.shared).closed {
            return Err(ScaleError::not_connected());
        }
        let link = self.link.as_mut().ok_or_else(ScaleError::not_connected)?;

        write_command(&mut link.writer, command).await.map_err(|e| {
            error!(port = %link.port, command = %command, error = %e, "Failed to write to scale");
            ScaleError::new(
                ScaleErrorCode::SendError,
                format!("Failed to send {command}: {e}"),
            )
        })
    }
}

async fn write_command(
    writer: &mut WriteHalf<Box<dyn SerialIo>>,
    command: ScaleCommand,
) -> std::io::Result<()> {
    debug!(command = %command, "Sending scale command");
    writer.write_all(command.frame().as_bytes()).await?;
    writer.flush().await
}

// =============================================================================
// Reader Task
// =============================================================================

async fn read_loop(
    read_half: ReadHalf<Box<dyn SerialIo>>,
    shared: Arc<Mutex<Shared>>,
    port: String,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!(port = %port, "Scale port closed");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                if !line.is_empty() {
                    dispatch_line(&shared, line);
                }
            }
            Err(e) => {
                warn!(port = %port, error = %e, "Scale read failed");
                break;
            }
        }
    }

    let mut state = lock(&shared);
    state.closed = true;
    if let Some(pending) = state.pending.take() {
        let _ = pending.tx.send(Err(ScaleError::not_connected()));
    }
}

fn dispatch_line(shared: &Mutex<Shared>, line: &str) {
    let reading = match parse_response(line) {
        Ok(reading) => reading,
        Err(e) if e.code == ScaleErrorCode::ScaleError => {
            warn!(line = %line, "Scale reported an error");
            if let Some(pending) = lock(shared).pending.take() {
                let _ = pending.tx.send(Err(e));
            }
            return;
        }
        Err(e) => {
            debug!(line = %line, error = %e, "Ignoring unparseable scale line");
            return;
        }
    };

    let callback = {
        let mut state = lock(shared);
        state.last_reading = Some(reading.clone());

        let satisfied = state
            .pending
            .as_ref()
            .is_some_and(|p| reading.stable || !p.require_stable);
        if satisfied {
            if let Some(pending) = state.pending.take() {
                let _ = pending.tx.send(Ok(reading.clone()));
            }
        }

        state.callback.clone()
    };

    if let Some(callback) = callback {
        callback(reading);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
