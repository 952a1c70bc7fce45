//! # Scale Configuration
//!
//! Line speed and request ceilings for the scale engine. Usually embedded in
//! the station's `[scale]` TOML section.
//!
//! ```toml
//! [scale]
//! port = "COM3"
//! baud_rate = 9600
//! poll_interval_ms = 100
//! immediate_attempts = 20   # SI: 2 s ceiling
//! stable_attempts = 100     # S: 10 s ceiling
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default line speed of Radwag scales.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Settings for the scale engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Port connected at startup, if any.
    #[serde(default)]
    pub port: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Tick of the request ceiling.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Ticks an immediate (`SI`) request may wait.
    #[serde(default = "default_immediate_attempts")]
    pub immediate_attempts: u32,

    /// Ticks a stable (`S`) request may wait.
    #[serde(default = "default_stable_attempts")]
    pub stable_attempts: u32,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_immediate_attempts() -> u32 {
    20
}

fn default_stable_attempts() -> u32 {
    100
}

impl Default for ScaleConfig {
    fn default() -> Self {
        ScaleConfig {
            port: None,
            baud_rate: default_baud_rate(),
            poll_interval_ms: default_poll_interval_ms(),
            immediate_attempts: default_immediate_attempts(),
            stable_attempts: default_stable_attempts(),
        }
    }
}

impl ScaleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// How long `SI` waits for any reading.
    pub fn immediate_ceiling(&self) -> Duration {
        self.poll_interval() * self.immediate_attempts
    }

    /// How long `S` waits for a stable reading.
    pub fn stable_ceiling(&self) -> Duration {
        self.poll_interval() * self.stable_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ceilings() {
        let config = ScaleConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.immediate_ceiling(), Duration::from_secs(2));
        assert_eq!(config.stable_ceiling(), Duration::from_secs(10));
    }
}
