//! # Station Commands
//!
//! Everything the UI can ask the station to do.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (exports)
//! ├── shipment.rs  ◄─── Shipments: create, edit, protect, archive, folders
//! ├── part.rs      ◄─── Pack/unpack, weights, serial numbers
//! ├── photo.rs     ◄─── Photo evidence
//! ├── user.rs      ◄─── Login and accounts
//! ├── scale.rs     ◄─── Serial scale control and readings
//! └── settings.rs  ◄─── Key/value station settings
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UI                                                                     │
//! │    pack_part { partId }                                                 │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  pub async fn pack_part(state: &AppState, part_id: &str)                │
//! │      -> CommandResult<Part>                                             │
//! │         │                                                               │
//! │         ▼  IpcResponse::from(result)                                    │
//! │  { "success": true, "data": { ...part } }                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every command takes the [`AppState`](crate::state::AppState) it needs by
//! reference and returns a [`CommandResult`](crate::error::CommandResult).

pub mod part;
pub mod photo;
pub mod scale;
pub mod settings;
pub mod shipment;
pub mod user;
