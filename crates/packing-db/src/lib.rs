//! # packing-db: Persistent Store for the Packing Station
//!
//! This crate owns the station's SQLite database: opening and bootstrapping
//! the file, upgrading it in place, and every SQL statement the station runs.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Packing Station Data Flow                          │
//! │                                                                         │
//! │  Station command (pack_part)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     packing-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ Store         │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (store.rs)    │    │               │    │              │  │   │
//! │  │   │ init / close  │    │ Shipments     │    │ schema.sql   │  │   │
//! │  │   │ Database      │◄───│ Parts, Photos │    │ + add column │  │   │
//! │  │   │ (pool.rs)     │    │ Users         │    │ + views      │  │   │
//! │  │   └───────────────┘    │ Settings      │    └──────────────┘  │   │
//! │  │                        └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/warehouse.db                                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - Process-wide lifecycle (`init`, `close`)
//! - [`pool`] - Database handle, generic query API, snapshots
//! - [`schema`] - Bootstrap schema lookup
//! - [`migrations`] - Introspective upgrade steps
//! - [`row`] - JSON rows and parameters
//! - [`credentials`] - argon2 password hashing
//! - [`repository`] - Shipment, part, photo, user and settings repositories
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use packing_db::{DbConfig, Store};
//!
//! let store = Store::new(DbConfig::new("path/to/warehouse.db"));
//! let db = store.init().await?;
//!
//! let shipments = db.shipments().list(&Default::default()).await?;
//!
//! store.close().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod credentials;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod row;
pub mod schema;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::MigrationReport;
pub use pool::{Database, DbConfig, SnapshotPolicy, StoreTx};
pub use row::{ExecuteResult, Row};
pub use store::Store;

// Repository re-exports for convenience
pub use repository::part::PartRepository;
pub use repository::photo::PhotoRepository;
pub use repository::settings::SettingsRepository;
pub use repository::shipment::ShipmentRepository;
pub use repository::user::UserRepository;

/// File name of the station database.
pub const DATABASE_FILE_NAME: &str = "warehouse.db";

// =============================================================================
// Test Support
// =============================================================================
