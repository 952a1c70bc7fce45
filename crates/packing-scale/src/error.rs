//! # Scale Error Types
//!
//! Every failure of the scale layer is a value. Reading operations return
//! `Result<ScaleReading, ScaleError>`; nothing in this crate panics on a
//! device problem or hands a raw I/O error to its callers.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Scale Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────────┐  ┌─────────────────────┐  ┌────────────────┐  │
//! │  │  Transport          │  │  Protocol           │  │  Device        │  │
//! │  │                     │  │                     │  │                │  │
//! │  │  NOT_CONNECTED      │  │  FORMAT_ERROR       │  │  SCALE_ERROR   │  │
//! │  │  SEND_ERROR         │  │  PARSE_ERROR        │  │  ('!' line)    │  │
//! │  │  TIMEOUT            │  │                     │  │                │  │
//! │  └─────────────────────┘  └─────────────────────┘  └────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

/// Result type alias for scale operations.
pub type ScaleResult<T> = Result<T, ScaleError>;

/// Machine-readable reason for a failed scale operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScaleErrorCode {
    /// No serial connection is open.
    NotConnected,
    /// Writing the command to the port failed.
    SendError,
    /// No matching response arrived within the request ceiling.
    Timeout,
    /// The line does not have the expected shape.
    FormatError,
    /// The numeric field is not a number.
    ParseError,
    /// The scale reported an error (`!` indicator).
    ScaleError,
}

impl std::fmt::Display for ScaleErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ScaleErrorCode::NotConnected => "NOT_CONNECTED",
            ScaleErrorCode::SendError => "SEND_ERROR",
            ScaleErrorCode::Timeout => "TIMEOUT",
            ScaleErrorCode::FormatError => "FORMAT_ERROR",
            ScaleErrorCode::ParseError => "PARSE_ERROR",
            ScaleErrorCode::ScaleError => "SCALE_ERROR",
        };
        f.write_str(code)
    }
}

/// A failed scale operation.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{code}: {message}")]
pub struct ScaleError {
    pub message: String,
    pub code: ScaleErrorCode,
}

impl ScaleError {
    pub fn new(code: ScaleErrorCode, message: impl Into<String>) -> Self {
        ScaleError {
            message: message.into(),
            code,
        }
    }

    pub fn not_connected() -> Self {
        ScaleError::new(ScaleErrorCode::NotConnected, "Scale is not connected")
    }

    pub fn timeout(waited_ms: u128) -> Self {
        ScaleError::new(
            ScaleErrorCode::Timeout,
            format!("No response from scale within {waited_ms} ms"),
        )
    }
}
