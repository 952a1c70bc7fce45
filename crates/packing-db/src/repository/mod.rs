//! # Repository Module
//!
//! Domain operations on top of the store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Station command                                                        │
//! │       │                                                                 │
//! │       │  db.parts().pack(&id)                                           │
//! │       ▼                                                                 │
//! │  PartRepository                                                         │
//! │  ├── loads part + shipment                                              │
//! │  ├── checks packing rules (packing-core)                                │
//! │  ├── UPDATE parts ...                                                   │
//! │  └── snapshot                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes snapshot before returning (see [`crate::pool`]); reads do not.
//!
//! ## Available Repositories
//!
//! - [`shipment::ShipmentRepository`] - Shipments, stats, output folders
//! - [`part::PartRepository`] - Pack/unpack, weights, serial numbers
//! - [`photo::PhotoRepository`] - Photo evidence (file + row)
//! - [`user::UserRepository`] - Accounts and authentication
//! - [`settings::SettingsRepository`] - Key/value settings

pub mod part;
pub mod photo;
pub mod settings;
pub mod shipment;
pub mod user;

/// Empty or whitespace-only text becomes `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
