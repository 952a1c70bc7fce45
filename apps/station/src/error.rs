//! # API Error Type
//!
//! Unified error type for station commands, and the response envelope the
//! UI receives.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Command Function  ─────►  Result<T, ApiError>                          │
//! │        │                                                                │
//! │        ├── DbError     (store, repositories)  ──┐                       │
//! │        ├── CoreError   (packing rules)        ──┼──►  ApiError          │
//! │        └── ScaleError  (serial scale)         ──┘       │               │
//! │                                                         ▼               │
//! │  IpcResponse<T>                                                         │
//! │    Ok(data)  ─► { "success": true,  "data": ... }                       │
//! │    Err(e)    ─► { "success": false, "error": { "code", "message" } }    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use packing_core::{CoreError, ValidationError};
use packing_db::DbError;
use packing_scale::{ScaleError, ScaleErrorCode};

/// Result of a station command.
pub type CommandResult<T> = Result<T, ApiError>;

/// API error returned from commands.
///
/// ```json
/// { "code": "NOT_FOUND", "message": "Part not found: 0b6f..." }
/// { "code": "SCALE_ERROR", "message": "TIMEOUT: ...", "scaleCode": "TIMEOUT" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Scale failure reason, present only with [`ErrorCode::ScaleError`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_code: Option<ScaleErrorCode>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,

    /// Input validation failed.
    ValidationError,

    /// A value that must be unique is already taken.
    Duplicate,

    /// Wrong login, password or shipment password.
    InvalidCredentials,

    /// Packing rule violated (missing weight, completed shipment, ...).
    BusinessLogic,

    DatabaseError,

    /// The store was used before initialization or after close.
    NotInitialized,

    /// The scale failed or is not connected.
    ScaleError,

    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            scale_code: None,
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Duplicate,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::InvalidCredentials => {
                ApiError::new(ErrorCode::InvalidCredentials, "Invalid credentials")
            }
            DbError::Validation(e) => e.into(),
            DbError::Rule(e) => e.into(),
            DbError::NotInitialized => {
                ApiError::new(ErrorCode::NotInitialized, "Database is not initialized")
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::Io(e) => {
                tracing::error!("File operation failed: {}", e);
                ApiError::internal(format!("File operation failed: {}", e))
            }
            other => {
                // Log the actual error but return a generic message
                tracing::error!("Database operation failed: {}", other);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => e.into(),
            other => ApiError::new(ErrorCode::BusinessLogic, other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<ScaleError> for ApiError {
    fn from(err: ScaleError) -> Self {
        ApiError {
            scale_code: Some(err.code),
            ..ApiError::new(ErrorCode::ScaleError, err.to_string())
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Response Envelope
// =============================================================================

/// What the UI receives for every command.
///
/// Exactly one of `data` and `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpcResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> IpcResponse<T> {
    pub fn ok(data: T) -> Self {
        IpcResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        IpcResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> CommandResult<T> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ApiError::internal("Empty response")),
        }
    }
}

impl<T> From<CommandResult<T>> for IpcResponse<T> {
    fn from(result: CommandResult<T>) -> Self {
        match result {
            Ok(data) => IpcResponse::ok(data),
            Err(error) => IpcResponse::err(error),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope() {
        let response = IpcResponse::from(Ok::<u32, ApiError>(7));
        assert!(response.success);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "success": true, "data": 7 })
        );
    }

    #[test]
    fn test_failure_envelope() {
        let response = IpcResponse::from(Err::<u32, ApiError>(ApiError::not_found("Part", "p-1")));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": false,
                "error": { "code": "NOT_FOUND", "message": "Part not found: p-1" }
            })
        );
        assert_eq!(response.into_result().unwrap_err().code, ErrorCode::NotFound);
    }

    #[test]
    fn test_db_error_mapping() {
        let err: ApiError = DbError::InvalidCredentials.into();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);

        let err: ApiError = DbError::duplicate("login", "admin").into();
        assert_eq!(err.code, ErrorCode::Duplicate);

        let err: ApiError = DbError::Rule(CoreError::ShipmentCompleted("s-1".into())).into();
        assert_eq!(err.code, ErrorCode::BusinessLogic);

        let err: ApiError = DbError::Validation(ValidationError::Required {
            field: "login".into(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err: ApiError = DbError::QueryFailed("near SELECT: syntax error".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn test_scale_error_keeps_scale_code() {
        let err: ApiError = ScaleError::timeout(2000).into();
        assert_eq!(err.code, ErrorCode::ScaleError);
        assert_eq!(err.scale_code, Some(ScaleErrorCode::Timeout));
        assert!(err.message.starts_with("TIMEOUT"));

        let err: ApiError = ScaleError::not_connected().into();
        assert_eq!(err.scale_code, Some(ScaleErrorCode::NotConnected));
        assert_eq!(serde_json::to_value(&err).unwrap()["scaleCode"], json!("NOT_CONNECTED"));

        let err = ApiError::not_found("Part", "p-1");
        assert!(err.scale_code.is_none());
    }
}
