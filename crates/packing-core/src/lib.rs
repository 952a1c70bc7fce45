//! # packing-core: Pure Domain Logic for the Packing Station
//!
//! This crate holds the domain model of the packing station as plain types
//! and pure functions. It never touches the database, the serial port or the
//! file system.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Packing Station Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Frontend (packing screens)                    │   │
//! │  │    Import ──► Pack list ──► Weigh ──► Photos ──► Report          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ IPC                                    │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/station commands                        │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼──────────────┐   ┌───────────────▼───────────────┐   │
//! │  │  packing-db (SQLite)        │   │  packing-scale (RS-232)       │   │
//! │  └──────────────┬──────────────┘   └───────────────────────────────┘   │
//! │                 │                                                       │
//! │  ┌──────────────▼──────────────────────────────────────────────────┐   │
//! │  │               ★ packing-core (THIS CRATE) ★                     │   │
//! │  │   types • validation • folder derivation • errors               │   │
//! │  │   NO I/O • NO DATABASE • NO SERIAL • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Shipment, Part, Photo, User, ...)
//! - [`folder`] - Output folder derivation for photos and reports
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use packing_core::folder::shipment_folder;
//! use std::path::Path;
//!
//! let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
//! let folder = shipment_folder(Path::new("/data"), "SH/001", "Berlin Hub", date, None);
//! assert!(folder.ends_with("shipments/SH_001_Berlin_Hub_2024-03-05"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod folder;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Name of the directory under the data root that holds shipment folders.
pub const SHIPMENTS_DIR_NAME: &str = "shipments";

/// Unit assumed for parts imported without one.
pub const DEFAULT_PART_UNIT: &str = "pcs";

/// Login of the administrator account seeded into an empty database.
pub const DEFAULT_ADMIN_LOGIN: &str = "admin";
