//! # Validation Module
//!
//! Input validation for data entering the station through the command layer.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend                                                     │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repositories (Rust)                                          │
//! │  └── THIS MODULE: domain rule validation                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Unique active login index                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_SHIPMENT_NUMBER_LEN: usize = 64;
const MAX_DESTINATION_LEN: usize = 200;
const MIN_LOGIN_LEN: usize = 3;
const MAX_LOGIN_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 4;

// =============================================================================
// String Validators
// =============================================================================

fn required<'a>(field: &str, value: &'a str) -> ValidationResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(trimmed)
}

fn max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a shipment number.
///
/// ## Rules
/// - Must not be blank
/// - At most 64 characters
///
/// ## Example
/// ```rust
/// use packing_core::validation::validate_shipment_number;
///
/// assert!(validate_shipment_number("SH-2024-001").is_ok());
/// assert!(validate_shipment_number("   ").is_err());
/// ```
pub fn validate_shipment_number(number: &str) -> ValidationResult<()> {
    let number = required("shipment_number", number)?;
    max_len("shipment_number", number, MAX_SHIPMENT_NUMBER_LEN)
}

/// Validates a shipment destination.
pub fn validate_destination(destination: &str) -> ValidationResult<()> {
    let destination = required("destination", destination)?;
    max_len("destination", destination, MAX_DESTINATION_LEN)
}

/// Validates a user login.
///
/// ## Rules
/// - 3 to 32 characters
/// - ASCII letters, digits, `.`, `_` and `-` only
pub fn validate_login(login: &str) -> ValidationResult<()> {
    let login = required("login", login)?;

    if login.len() < MIN_LOGIN_LEN {
        return Err(ValidationError::TooShort {
            field: "login".to_string(),
            min: MIN_LOGIN_LEN,
        });
    }
    max_len("login", login, MAX_LOGIN_LEN)?;

    if !login
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "login".to_string(),
            reason: "only letters, digits, '.', '_' and '-' are allowed".to_string(),
        });
    }

    Ok(())
}

/// Validates a new password.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Validates a person's first name or surname.
pub fn validate_person_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = required(field, value)?;
    max_len(field, value, 100)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a part quantity (positive, finite).
pub fn validate_quantity(quantity: f64) -> ValidationResult<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a captured weight. Zero is allowed (tared container).
pub fn validate_weight(weight: f64) -> ValidationResult<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(ValidationError::InvalidFormat {
            field: "weight".to_string(),
            reason: format!("{weight} is not a valid weight"),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
