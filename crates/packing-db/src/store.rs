//! # Store Lifecycle
//!
//! Holds at most one open [`Database`] for the whole application.
//!
//! ```text
//!            init()                    close()
//!   ┌────────┐ ───────► ┌──────────┐ ─────────► ┌────────┐
//!   │ Closed │          │  Open    │            │ Closed │ ── init() reloads
//!   └────────┘ ◄─────── └──────────┘            └────────┘    from disk
//!       │      (error)     │  init() again → same handle
//!       │                  │
//!       └─ query/execute/transaction → DbError::NotInitialized
//! ```

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::{Database, DbConfig, StoreTx};
use crate::row::{ExecuteResult, Row};

/// Process-wide owner of the database handle.
///
/// ## Usage
/// ```rust,ignore
/// let store = Store::new(DbConfig::new(data_dir.join("warehouse.db")));
/// store.init().await?;
///
/// let rows = store.query("SELECT * FROM shipments", &[]).await?;
///
/// store.close().await?;
/// ```
#[derive(Debug)]
pub struct Store {
    config: DbConfig,
    handle: Mutex<Option<Database>>,
}

impl Store {
    /// Creates a closed store. No I/O happens until [`Store::init`].
    pub fn new(config: DbConfig) -> Self {
        Store {
            config,
            handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Opens the database on the first call; later calls return the same
    /// handle.
    pub async fn init(&self) -> DbResult<Database> {
        let mut handle = self.handle.lock().await;

        if let Some(db) = handle.as_ref() {
            debug!("Store already initialized");
            return Ok(db.clone());
        }

        let db = Database::open(self.config.clone()).await?;
        *handle = Some(db.clone());

        info!(path = %self.config.database_path.display(), "Store initialized");
        Ok(db)
    }

    /// Snapshots and closes the database. A later `init` reloads from disk.
    pub async fn close(&self) -> DbResult<()> {
        let db = self.handle.lock().await.take();

        match db {
            Some(db) => db.close().await,
            None => Ok(()),
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// The open database.
    pub async fn database(&self) -> DbResult<Database> {
        self.handle
            .lock()
            .await
            .clone()
            .ok_or(DbError::NotInitialized)
    }

    pub async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.database().await?.query(sql, params).await
    }

    pub async fn query_one(&self, sql: &str, params: &[Value]) -> DbResult<Option<Row>> {
        self.database().await?.query_one(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecuteResult> {
        self.database().await?.execute(sql, params).await
    }

    /// See [`Database::transaction`].
    pub async fn transaction<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut StoreTx) -> BoxFuture<'t, DbResult<T>>,
    {
        self.database().await?.transaction(f).await
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

    const SCHEMA_SQL: &str =
        "SELECT type, name, sql FROM sqlite_master WHERE name NOT LIKE 'sqlite_%' ORDER BY type, name";

    #[tokio::test]
    async fn test_operations_before_init_fail() {
        let temp = TempDb::new();
        let store = Store::new(temp.config());

        assert!(!store.is_initialized().await);
        assert!(matches!(
            store.query("SELECT 1", &[]).await,
            Err(DbError::NotInitialized)
        ));
        assert!(matches!(
            store.execute("SELECT 1", &[]).await,
            Err(DbError::NotInitialized)
        ));
        assert!(!temp.path().exists());
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let temp = TempDb::new();
        let store = Store::new(temp.config());

        store.init().await.unwrap();
        let first = store.query(SCHEMA_SQL, &[]).await.unwrap();

        store.init().await.unwrap();
        let second = store.query(SCHEMA_SQL, &[]).await.unwrap();

        assert_eq!(first, second);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_reopen_gives_identical_schema_and_data() {
        let temp = TempDb::new();

        let store = Store::new(temp.config());
        store.init().await.unwrap();
        store
            .execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)",
                &[json!("reopen"), json!("kept")],
            )
            .await
            .unwrap();
        let schema_before = store.query(SCHEMA_SQL, &[]).await.unwrap();
        store.close().await.unwrap();

        assert!(matches!(
            store.query("SELECT 1", &[]).await,
            Err(DbError::NotInitialized)
        ));

        // A fresh store on the same file: no bootstrap, migrations are no-ops.
        let store = Store::new(temp.config());
        let db = store.init().await.unwrap();
        let report = db.run_migrations().await;
        assert!(report.applied.is_empty());
        assert!(report.failed.is_empty());

        let schema_after = store.query(SCHEMA_SQL, &[]).await.unwrap();
        assert_eq!(schema_before, schema_after);

        let row = store
            .query_one("SELECT value FROM settings WHERE key = 'reopen'", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["value"], json!("kept"));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_without_init_is_noop() {
        let temp = TempDb::new();
        let store = Store::new(temp.config());
        store.close().await.unwrap();
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_store_transaction_rolls_back() {
        let temp = TempDb::new();
        let store = Store::new(temp.config());
        store.init().await.unwrap();

        let result: DbResult<()> = store
            .transaction(|tx| {
                Box::pin(async move {
                    tx.execute("DELETE FROM settings", &[]).await?;
                    tx.execute("INSERT INTO no_such_table VALUES (1)", &[]).await?;
                    Ok(())
                })
            })
            .await;
        assert!(result.is_err());

        let rows = store.query("SELECT key FROM settings", &[]).await.unwrap();
        assert!(!rows.is_empty());
        store.close().await.unwrap();
    }
}
