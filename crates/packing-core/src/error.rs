//! # Error Types
//!
//! Domain-specific error types for packing-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  packing-core errors (this file)                                       │
//! │  ├── CoreError        - Packing rule violations                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  packing-db errors                                                     │
//! │  └── DbError          - Persistence and domain lookups                 │
//! │                                                                         │
//! │  packing-scale errors                                                  │
//! │  └── ScaleError       - Typed device/protocol failures                 │
//! │                                                                         │
//! │  Station errors (in app)                                               │
//! │  └── ApiError         - What the frontend sees (serialized)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Packing rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The part cannot be packed until the shipment's requirements are met.
    ///
    /// ## When This Occurs
    /// - `require_weight` is set and no weight was captured
    /// - `require_country` is set and the part has no country of origin
    /// - `require_serial_numbers` is set and no serial number was recorded
    #[error("Part {part_id} is missing {requirement}")]
    RequirementNotMet { part_id: String, requirement: String },

    /// The shipment is completed and can no longer change.
    #[error("Shipment {0} is completed")]
    ShipmentCompleted(String),

    /// The shipment cannot be completed while parts are still pending.
    #[error("Shipment {shipment_id} still has {pending} unpacked parts")]
    PartsPending { shipment_id: String, pending: i64 },

    /// Bad input detected while applying a rule.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Rejected operator input. `field` names the form field for the UI.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Blank after trimming.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Zero, negative, NaN or infinite.
    #[error("{field} must be a positive number")]
    MustBePositive { field: String },

    /// Disallowed characters or shape; `reason` is shown to the operator.
    #[error("{field} is invalid: {reason}")]
    InvalidFormat { field: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
