//! # Scale Protocol
//!
//! Command framing and response parsing for Radwag-class scales.
//!
//! ## Wire Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Host ──► Scale                     Scale ──► Host                      │
//! │  ──────────────                     ──────────────                      │
//! │  "SI\r\n"  immediate reading        "S _ + 12.345 kg\r\n"               │
//! │  "S\r\n"   stable reading            │ │ │    │     │                   │
//! │  "C1\r\n"  continuous on             │ │ │    │     └── unit            │
//! │  "C0\r\n"  continuous off            │ │ │    └──────── value           │
//! │  "Z\r\n"   zero                      │ │ └───────────── sign            │
//! │  "T\r\n"   tare                      │ └─────────────── filler          │
//! │                                      └───────────────── S | U | !       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{ScaleError, ScaleErrorCode, ScaleResult};

/// Lines shorter than this cannot hold a reading.
pub const MIN_RESPONSE_LEN: usize = 10;

/// Unit assumed when the scale omits it.
pub const DEFAULT_UNIT: &str = "kg";

// =============================================================================
// Commands
// =============================================================================

/// Commands understood by the scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleCommand {
    /// `SI`: send the current reading, settled or not.
    Immediate,
    /// `S`: send the reading once it is stable.
    Stable,
    /// `C1`: stream readings until `C0`.
    ContinuousOn,
    /// `C0`: stop streaming.
    ContinuousOff,
    /// `Z`: zero the scale.
    Zero,
    /// `T`: tare the scale.
    Tare,
}

impl ScaleCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleCommand::Immediate => "SI",
            ScaleCommand::Stable => "S",
            ScaleCommand::ContinuousOn => "C1",
            ScaleCommand::ContinuousOff => "C0",
            ScaleCommand::Zero => "Z",
            ScaleCommand::Tare => "T",
        }
    }

    /// The command as written to the port, CRLF terminated.
    pub fn frame(&self) -> String {
        format!("{}\r\n", self.as_str())
    }
}

impl std::fmt::Display for ScaleCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Reading
// =============================================================================

/// A weight reported by the scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleReading {
    pub value: f64,
    pub unit: String,
    pub stable: bool,
    /// Host receive time, ms since the Unix epoch. The scale sends none.
    pub timestamp: i64,
}

impl ScaleReading {
    /// Creates a reading stamped with the current time.
    pub fn new(value: f64, unit: impl Into<String>, stable: bool) -> Self {
        ScaleReading {
            value,
            unit: unit.into(),
            stable,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

fn format_error(message: impl Into<String>) -> ScaleError {
    ScaleError::new(ScaleErrorCode::FormatError, message)
}

fn is_filler(token: &str) -> bool {
    token.chars().all(|c| matches!(c, '_' | '+' | '-'))
}

/// Parses one response line (CR/LF already stripped or not).
///
/// ## Rules
/// 1. A line starting with `!` is a device error (`SCALE_ERROR`).
/// 2. Lines shorter than [`MIN_RESPONSE_LEN`] are `FORMAT_ERROR`.
/// 3. Byte 0 must be `S` (stable) or `U` (unstable).
/// 4. At least 3 whitespace separated tokens.
/// 5. Filler tokens (`_`, `+`, `-`) are skipped; the next token is the value
///    and the one after it the unit (`kg` if missing).
/// 6. A `-` anywhere before the end of the value makes the value negative.
///
/// ## Example
/// ```rust
/// use packing_scale::protocol::parse_response;
///
/// let reading = parse_response("S _ + 12.345 kg").unwrap();
/// assert_eq!(reading.value, 12.345);
/// assert!(reading.stable);
/// ```
pub fn parse_response(line: &str) -> ScaleResult<ScaleReading> {
    let line = line.trim_end();

    if line.starts_with('!') {
        return Err(ScaleError::new(
            ScaleErrorCode::ScaleError,
            format!("Scale reported an error: '{line}'"),
        ));
    }

    if line.len() < MIN_RESPONSE_LEN {
        return Err(format_error(format!(
            "Response too short ({} chars): '{line}'",
            line.len()
        )));
    }

    let stable = match line.as_bytes()[0] {
        b'S' => true,
        b'U' => false,
        other => {
            return Err(format_error(format!(
                "Unknown stability indicator '{}'",
                other as char
            )))
        }
    };

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(format_error(format!(
            "Expected at least 3 fields, got {}: '{line}'",
            tokens.len()
        )));
    }

    // tokens[0] is the stability block; sign may be glued to it ("S-")
    let mut negative = tokens[0][1..].contains('-');
    let mut rest = tokens[1..].iter();
    let mut value_token = None;
    for token in rest.by_ref() {
        if is_filler(token) {
            negative |= token.contains('-');
        } else {
            value_token = Some(*token);
            break;
        }
    }

    let value_token = value_token.ok_or_else(|| {
        ScaleError::new(
            ScaleErrorCode::ParseError,
            format!("No numeric field in '{line}'"),
        )
    })?;
    let unit = rest.next().copied().unwrap_or(DEFAULT_UNIT);

    let cleaned: String = value_token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    negative |= cleaned.contains('-');

    let magnitude = cleaned
        .replace('-', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            ScaleError::new(
                ScaleErrorCode::ParseError,
                format!("Cannot parse '{value_token}' as a number"),
            )
        })?;

    let value = if negative && magnitude != 0.0 {
        -magnitude
    } else {
        magnitude
    };

    Ok(ScaleReading::new(value, unit, stable))
}

/// Renders a reading the way the scale sends it (without CRLF).
pub fn format_response(reading: &ScaleReading) -> String {
    format!(
        "{} _ {} {:>9} {}",
        if reading.stable { 'S' } else { 'U' },
        if reading.value < 0.0 { '-' } else { '+' },
        reading.value.abs(),
        reading.unit
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn code(line: &str) -> ScaleErrorCode {
        parse_response(line).unwrap_err().code
    }

    #[test]
    fn test_parse_stable_reading() {
        let reading = parse_response("S _ + 12.345 kg").unwrap();
        assert_eq!(reading.value, 12.345);
        assert_eq!(reading.unit, "kg");
        assert!(reading.stable);
        assert!(reading.timestamp > 0);
    }

    #[test]
    fn test_parse_unstable_negative_reading() {
        let reading = parse_response("U _ - 3.2 g").unwrap();
        assert_eq!(reading.value, -3.2);
        assert_eq!(reading.unit, "g");
        assert!(!reading.stable);
    }

    #[test]
    fn test_parse_compact_sign_at_byte_two() {
        let reading = parse_response("S -12.300 kg\r\n").unwrap();
        assert_eq!(reading.value, -12.3);

        let reading = parse_response("U +0000.50 kg").unwrap();
        assert_eq!(reading.value, 0.5);
    }

    #[test]
    fn test_parse_device_error() {
        assert_eq!(code("!"), ScaleErrorCode::ScaleError);
        assert_eq!(code("! overload  "), ScaleErrorCode::ScaleError);
    }

    #[test]
    fn test_parse_format_errors() {
        assert_eq!(code("S 1 kg"), ScaleErrorCode::FormatError);
        assert_eq!(code(""), ScaleErrorCode::FormatError);
        assert_eq!(code("X _ + 12.345 kg"), ScaleErrorCode::FormatError);
        assert_eq!(code("S 123456789"), ScaleErrorCode::FormatError);
    }

    #[test]
    fn test_parse_errors_on_bad_number() {
        assert_eq!(code("S _ + abc kg"), ScaleErrorCode::ParseError);
        assert_eq!(code("S _ + 1.2.3 kg"), ScaleErrorCode::ParseError);
        assert_eq!(code("S _ + _ - ___"), ScaleErrorCode::ParseError);
    }

    #[test]
    fn test_unit_defaults_to_kg() {
        let reading = parse_response("S _ + 12.345").unwrap();
        assert_eq!(reading.unit, "kg");
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let reading = parse_response("S _ - 0.000 kg").unwrap();
        assert_eq!(reading.value, 0.0);
        assert!(reading.value.is_sign_positive());
    }

    #[test]
    fn test_format_then_parse_keeps_value_and_stability() {
        for (value, unit, stable) in [(12.345, "kg", true), (-3.2, "g", false), (0.5, "g", true)] {
            let reading = ScaleReading::new(value, unit, stable);
            let parsed = parse_response(&format_response(&reading)).unwrap();
            assert_eq!(parsed.value, value);
            assert_eq!(parsed.stable, stable);
            assert_eq!(parsed.unit, unit);
        }
    }

    #[test]
    fn test_command_frames() {
        assert_eq!(ScaleCommand::Immediate.frame(), "SI\r\n");
        assert_eq!(ScaleCommand::Stable.frame(), "S\r\n");
        assert_eq!(ScaleCommand::ContinuousOn.frame(), "C1\r\n");
        assert_eq!(ScaleCommand::ContinuousOff.frame(), "C0\r\n");
        assert_eq!(ScaleCommand::Zero.frame(), "Z\r\n");
        assert_eq!(ScaleCommand::Tare.frame(), "T\r\n");
    }
}
