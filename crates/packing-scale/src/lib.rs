//! # packing-scale: Weighing Scale Driver
//!
//! Talks to a Radwag-class scale over RS-232: sends single-line ASCII
//! commands and turns the replies into [`ScaleReading`]s.
//!
//! ## Module Structure
//! ```text
//! packing-scale/
//! ├── engine.rs     # ScaleEngine: connection, requests, continuous mode
//! ├── protocol.rs   # Commands, parse_response / format_response
//! ├── transport.rs  # SerialPortProvider, tokio-serial ports
//! ├── config.rs     # ScaleConfig (baud, request ceilings)
//! └── error.rs      # ScaleError + ScaleErrorCode
//! ```
//!
//! ## Typical Flow
//! ```text
//! ┌──────────────┐   connect("COM3")   ┌──────────────┐   "S\r\n"    ┌───────┐
//! │ Station UI   │ ──────────────────► │ ScaleEngine  │ ───────────► │ Scale │
//! │              │ ◄────────────────── │              │ ◄─────────── │       │
//! └──────────────┘   ScaleReading      └──────────────┘ "S _ + 1 kg" └───────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod transport;

pub use config::{ScaleConfig, DEFAULT_BAUD_RATE};
pub use engine::{ReadingCallback, ScaleEngine, ScaleState};
pub use error::{ScaleError, ScaleErrorCode, ScaleResult};
pub use protocol::{format_response, parse_response, ScaleCommand, ScaleReading};
pub use transport::{SerialIo, SerialPortProvider, SerialSettings, SystemSerialPorts};
