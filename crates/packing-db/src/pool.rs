//! # Database Handle
//!
//! Opens `warehouse.db`, bootstraps and migrates it, and exposes the generic
//! query API plus the repositories.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection                                │
//! │                                                                         │
//! │  DbConfig::new(path) ← Configure path, schema override, snapshots      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::open(config).await                                          │
//! │       │  1. create parent dir, open file (create if missing)           │
//! │       │  2. empty database? → apply schema/schema.sql                  │
//! │       │  3. run migrations (each step logged, failures skipped)        │
//! │       │  4. snapshot                                                   │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                   │                           │
//! │  │  ┌─────┐                                │  max_connections = 1      │
//! │  │  │Conn1│  every call runs on this one   │  → calls run in order     │
//! │  │  └─────┘                                │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  query / execute / transaction ──► snapshot ──► return                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshots
//! The database runs in WAL mode. A snapshot is `PRAGMA wal_checkpoint(TRUNCATE)`:
//! it folds the log into `warehouse.db` and empties it, so the main file holds
//! the full image when the call returns.

use futures_util::future::BoxFuture;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::{DbError, DbResult};
use crate::migrations::{self, MigrationReport};
use crate::repository::part::PartRepository;
use crate::repository::photo::PhotoRepository;
use crate::repository::settings::SettingsRepository;
use crate::repository::shipment::ShipmentRepository;
use crate::repository::user::UserRepository;
use crate::row::{bind_params, decode_row, ExecuteResult, Row};
use crate::schema;

// =============================================================================
// Configuration
// =============================================================================

/// When the database image is flushed to the main file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPolicy {
    /// After every query, execute and committed transaction.
    #[default]
    EveryCall,
    /// Only when the store is closed.
    OnClose,
}

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/warehouse.db")
///     .schema_path("/opt/station/resources/schema.sql")
///     .snapshot_policy(SnapshotPolicy::EveryCall);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Bootstrap schema to use instead of the default search paths.
    pub schema_path: Option<PathBuf>,

    /// Default: every call.
    pub snapshot: SnapshotPolicy,

    /// How long a call waits for the connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,
}

impl DbConfig {
    /// Creates a configuration for the given database file.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            schema_path: None,
            snapshot: SnapshotPolicy::EveryCall,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets an explicit schema file.
    pub fn schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    pub fn snapshot_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.snapshot = policy;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// =============================================================================
// Database
// =============================================================================

/// Open database: generic query API and repository access.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    snapshot: SnapshotPolicy,
}

impl Database {
    /// Opens (or creates) the database file.
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use handle
    /// * `Err(DbError::SchemaNotFound)` - New database and no schema file
    /// * `Err(DbError::ConnectionFailed)` - File cannot be opened
    pub async fn open(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(None)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!("Database pool created");

        if schema::is_empty(&pool).await? {
            info!("New database, applying schema");
            if let Err(e) = schema::bootstrap(&pool, config.schema_path.as_deref()).await {
                pool.close().await;
                return Err(e);
            }
        }

        let db = Database {
            pool,
            snapshot: config.snapshot,
        };

        db.run_migrations().await;
        db.snapshot().await?;

        Ok(db)
    }

    /// Runs the migration steps. Failed steps are logged and reported.
    pub async fn run_migrations(&self) -> MigrationReport {
        migrations::run_migrations(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    ///
    /// Prefer repository methods when available.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Generic API
    // =========================================================================

    /// Runs a statement and returns every row.
    pub async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        self.snapshot_if_due().await?;
        Ok(rows.iter().map(decode_row).collect())
    }

    /// Runs a statement and returns its first row, if any.
    pub async fn query_one(&self, sql: &str, params: &[Value]) -> DbResult<Option<Row>> {
        let row = bind_params(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await?;
        self.snapshot_if_due().await?;
        Ok(row.as_ref().map(decode_row))
    }

    /// Runs a statement that returns no rows.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecuteResult> {
        let result = bind_params(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?;
        self.snapshot_if_due().await?;
        Ok(ExecuteResult {
            changes: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back and returns the error
    /// otherwise. One snapshot is taken after the commit.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let changed = db
    ///     .transaction(|tx| {
    ///         Box::pin(async move {
    ///             tx.execute("UPDATE parts SET status = 'packed' WHERE id = ?1", &[json!(id)]).await?;
    ///             tx.execute("UPDATE shipments SET updated_at = ?1", &[json!(now)]).await
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut StoreTx) -> BoxFuture<'t, DbResult<T>>,
    {
        let inner = self.pool.begin().await?;
        let mut tx = StoreTx { inner };

        let outcome = f(&mut tx).await;
        match outcome {
            Ok(value) => {
                tx.inner
                    .commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                self.snapshot_if_due().await?;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "Rolling back transaction");
                if let Err(rollback_err) = tx.inner.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Flushes the write-ahead log into the main database file.
    pub async fn snapshot(&self) -> DbResult<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::Snapshot(e.to_string()))?;
        Ok(())
    }

    /// Snapshot unless the policy defers it to `close`.
    pub async fn snapshot_if_due(&self) -> DbResult<()> {
        match self.snapshot {
            SnapshotPolicy::EveryCall => self.snapshot().await,
            SnapshotPolicy::OnClose => Ok(()),
        }
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    pub fn shipments(&self) -> ShipmentRepository {
        ShipmentRepository::new(self.clone())
    }

    pub fn parts(&self) -> PartRepository {
        PartRepository::new(self.clone())
    }

    pub fn photos(&self) -> PhotoRepository {
        PhotoRepository::new(self.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.clone())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Takes a final snapshot and closes the pool.
    ///
    /// After calling close, all operations on this handle fail.
    pub async fn close(&self) -> DbResult<()> {
        info!("Closing database");
        let snapshot = self.snapshot().await;
        self.pool.close().await;
        snapshot
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// An open transaction handed to [`Database::transaction`] closures.
pub struct StoreTx {
    inner: Transaction<'static, Sqlite>,
}

impl StoreTx {
    /// The underlying connection, for typed sqlx queries.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.inner
    }

    pub async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&mut *self.inner)
            .await?;
        Ok(rows.iter().map(decode_row).collect())
    }

    pub async fn query_one(&mut self, sql: &str, params: &[Value]) -> DbResult<Option<Row>> {
        let row = bind_params(sqlx::query(sql), params)
            .fetch_optional(&mut *self.inner)
            .await?;
        Ok(row.as_ref().map(decode_row))
    }

    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<ExecuteResult> {
        let result = bind_params(sqlx::query(sql), params)
            .execute(&mut *self.inner)
            .await?;
        Ok(ExecuteResult {
            changes: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TempDb;
    use serde_json::json;

    #[tokio::test]
    async fn test_open_creates_schema_and_is_healthy() {
        let temp = TempDb::new();
        let db = temp.open().await;

        assert!(db.health_check().await);
        assert!(temp.path().exists());

        let tables = db
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                &[],
            )
            .await
            .unwrap();
        let names: Vec<&str> = tables.iter().filter_map(|r| r["name"].as_str()).collect();
        for table in ["parts", "photos", "settings", "shipments", "users"] {
            assert!(names.contains(&table), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn test_execute_reports_changes_and_rowid() {
        let temp = TempDb::new();
        let db = temp.open().await;

        let result = db
            .execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)",
                &[json!("test_key"), json!("v1")],
            )
            .await
            .unwrap();
        assert_eq!(result.changes, 1);
        assert!(result.last_insert_id > 0);

        let row = db
            .query_one("SELECT value FROM settings WHERE key = ?1", &[json!("test_key")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["value"], json!("v1"));

        let none = db
            .query_one("SELECT value FROM settings WHERE key = ?1", &[json!("absent")])
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_row_values_keep_storage_class() {
        let temp = TempDb::new();
        let db = temp.open().await;

        let row = db
            .query_one(
                "SELECT 42 AS i, 1.5 AS r, 'x' AS t, NULL AS n, ?1 AS b",
                &[json!(true)],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["i"], json!(42));
        assert_eq!(row["r"], json!(1.5));
        assert_eq!(row["t"], json!("x"));
        assert_eq!(row["n"], Value::Null);
        assert_eq!(row["b"], json!(1));
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_state_unchanged() {
        let temp = TempDb::new();
        let db = temp.open().await;

        let before = db.query("SELECT * FROM settings ORDER BY key", &[]).await.unwrap();

        let result: DbResult<()> = db
            .transaction(|tx| {
                Box::pin(async move {
                    tx.execute(
                        "UPDATE settings SET value = 'changed' WHERE key = 'scale_baud_rate'",
                        &[],
                    )
                    .await?;
                    tx.execute(
                        "INSERT INTO settings (key, value) VALUES ('new_key', 'x')",
                        &[],
                    )
                    .await?;
                    Err(DbError::QueryFailed("boom".to_string()))
                })
            })
            .await;
        assert!(matches!(result, Err(DbError::QueryFailed(_))));

        let after = db.query("SELECT * FROM settings ORDER BY key", &[]).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_committed_transaction_returns_value() {
        let temp = TempDb::new();
        let db = temp.open().await;

        let changes = db
            .transaction(|tx| {
                Box::pin(async move {
                    let a = tx
                        .execute("INSERT INTO settings (key, value) VALUES ('a', '1')", &[])
                        .await?;
                    let b = tx
                        .execute("INSERT INTO settings (key, value) VALUES ('b', '2')", &[])
                        .await?;
                    Ok(a.changes + b.changes)
                })
            })
            .await
            .unwrap();
        assert_eq!(changes, 2);

        let rows = db
            .query("SELECT key FROM settings WHERE key IN ('a', 'b')", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_empties_wal() {
        let temp = TempDb::new();
        let db = temp.open().await;

        db.execute(
            "INSERT INTO settings (key, value) VALUES ('snap', 'x')",
            &[],
        )
        .await
        .unwrap();

        let wal = temp.path().with_extension("db-wal");
        let wal_len = std::fs::metadata(&wal).map(|m| m.len()).unwrap_or(0);
        assert_eq!(wal_len, 0);
    }

    #[tokio::test]
    async fn test_missing_schema_is_fatal() {
        let temp = TempDb::new();
        let config = DbConfig::new(temp.path()).schema_path(temp.dir().join("missing.sql"));

        let err = Database::open(config).await.unwrap_err();
        assert!(matches!(err, DbError::SchemaNotFound { .. }));
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/warehouse.db")
            .snapshot_policy(SnapshotPolicy::OnClose)
            .connect_timeout(Duration::from_secs(5));

        assert_eq!(config.snapshot, SnapshotPolicy::OnClose);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.schema_path.is_none());
    }
}
