//! # Packing Station Library
//!
//! Application layer of the packing station: configuration, logging, the
//! shared state and the commands the UI calls.
//!
//! ## Module Organization
//! ```text
//! packing_station_lib/
//! ├── lib.rs          ◄─── You are here (logging, startup)
//! ├── config.rs       ◄─── station.toml + environment overrides
//! ├── state.rs        ◄─── AppState: store + scale engine
//! ├── commands/       ◄─── shipment, part, photo, user, scale, settings
//! └── error.rs        ◄─── ApiError and the {success, data|error} envelope
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()          RUST_LOG or "info,packing=debug,sqlx=warn"  │
//! │  2. StationConfig::load()   defaults → station.toml → environment       │
//! │  3. AppState::startup()     open store (schema bootstrap, migrations)   │
//! │                             connect the configured scale, if any        │
//! │  4. commands                                                            │
//! │  5. AppState::shutdown()    disconnect scale, snapshot + close store    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod state;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub use config::StationConfig;
pub use error::{ApiError, CommandResult, ErrorCode, IpcResponse};
pub use state::AppState;

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,packing=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=packing_scale=trace` - Trace the scale only
/// - Default: [`DEFAULT_LOG_FILTER`]
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let initialized = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok();

    if initialized {
        info!("Logging initialized");
    }
}

/// Builds the state for `config` and brings the station up.
pub async fn start(config: StationConfig) -> Result<AppState, ApiError> {
    let state = AppState::new(config);
    state.startup().await?;
    Ok(state)
}
