//! # Database Error Types
//!
//! Error types for the store and the repositories.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Domain rule (packing-core)          │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──────────────────┘                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (station command layer) ← {success: false, error}            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use packing_core::{CoreError, ValidationError};
use thiserror::Error;

/// Store and repository errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// No row with this id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation, e.g. a login already used by an active
    /// user.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A row refers to a shipment, part or user that does not exist.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Login/password or shipment password did not match.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Input rejected before reaching SQL.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Operation not allowed by the shipment's state or requirements.
    #[error(transparent)]
    Rule(#[from] CoreError),

    /// No bootstrap schema file at any candidate path.
    #[error("Schema file not found; looked in: {searched}")]
    SchemaNotFound { searched: String },

    /// The database file could not be opened.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A migration step failed. Logged and skipped at startup.
    #[error("Migration '{step}' failed: {message}")]
    MigrationFailed { step: String, message: String },

    /// Flushing the database image to disk failed.
    #[error("Snapshot failed: {0}")]
    Snapshot(String),

    /// The store was used before `init` or after `close`.
    #[error("Database is not initialized")]
    NotInitialized,

    /// SQLite rejected a statement.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Commit or rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (the single connection stayed busy too long).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Filesystem error while handling photo files or the schema file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// A value already taken, e.g. an active user's login.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Maps sqlx failures onto store errors.
///
/// ```text
/// RowNotFound                         → NotFound
/// "UNIQUE constraint failed: t.col"   → UniqueViolation { field: "t.col" }
/// "FOREIGN KEY constraint failed"     → ForeignKeyViolation
/// other database message              → QueryFailed
/// PoolTimedOut / PoolClosed           → PoolExhausted / NotInitialized
/// anything else                       → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => constraint_error(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::NotInitialized,
            other => DbError::Internal(other.to_string()),
        }
    }
}

fn constraint_error(message: &str) -> DbError {
    const UNIQUE: &str = "UNIQUE constraint failed: ";

    if let Some(at) = message.find(UNIQUE) {
        let field = message[at + UNIQUE.len()..].trim();
        DbError::duplicate(if field.is_empty() { "unknown" } else { field }, "unknown")
    } else if message.contains("FOREIGN KEY constraint failed") {
        DbError::ForeignKeyViolation {
            message: message.to_string(),
        }
    } else {
        DbError::QueryFailed(message.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
