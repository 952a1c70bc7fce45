//! # Serial Transport
//!
//! Opens the byte stream to the scale. The engine only needs something that
//! is `AsyncRead + AsyncWrite`, so the port is hidden behind
//! [`SerialPortProvider`]; production uses [`SystemSerialPorts`] and tests
//! use an in-memory pipe.
//!
//! ## Line Settings
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PC (DTE) ── null-modem cable (TX/RX crossed) ── Scale (DTE)            │
//! │                                                                         │
//! │  baud: configurable (default 9600)                                      │
//! │  data bits: 8   parity: none   stop bits: 1   flow control: none        │
//! │  framing: ASCII lines terminated by CR LF                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;

use crate::config::DEFAULT_BAUD_RATE;

/// A bidirectional byte stream to the scale.
pub trait SerialIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> SerialIo for T {}

/// Port name and speed for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        SerialSettings {
            port: port.into(),
            baud_rate,
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        SerialSettings::new(String::new(), DEFAULT_BAUD_RATE)
    }
}

/// Source of serial ports.
pub trait SerialPortProvider: Send + Sync {
    /// Names of the ports present on this machine.
    fn list_ports(&self) -> io::Result<Vec<String>>;

    /// Opens a port with 8-N-1 framing and no flow control.
    fn open(&self, settings: &SerialSettings) -> io::Result<Box<dyn SerialIo>>;
}

/// Serial ports of the host, via `tokio-serial`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerialPorts;

impl SerialPortProvider for SystemSerialPorts {
    fn list_ports(&self) -> io::Result<Vec<String>> {
        let ports = tokio_serial::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(&self, settings: &SerialSettings) -> io::Result<Box<dyn SerialIo>> {
        debug!(port = %settings.port, baud = settings.baud_rate, "Opening serial port");

        let stream = tokio_serial::new(settings.port.as_str(), settings.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open_native_async()?;

        Ok(Box::new(stream))
    }
}

// =============================================================================
// In-memory ports (tests)
// =============================================================================
