//! # Database Migrations
//!
//! Additive, introspective schema upgrades run on every startup.
//!
//! ## How Migrations Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  Store::init                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  for each step (in order):                                              │
//! │       │                                                                 │
//! │       ├── add column      PRAGMA table_info → ALTER TABLE if missing    │
//! │       ├── index / view    CREATE ... IF NOT EXISTS                      │
//! │       ├── settings        INSERT OR IGNORE default rows                 │
//! │       └── admin seed      only when the users table is empty            │
//! │       │                                                                 │
//! │       ├── ok      → applied / already present                           │
//! │       └── failure → logged, step skipped, next step still runs          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Append a step; never edit one that has shipped
//! 2. Steps must be no-ops when their change is already present
//! 3. Keep `schema/schema.sql` as the first-release shape

use chrono::Utc;
use sqlx::{Executor, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::credentials::hash_password;
use crate::error::{DbError, DbResult};
use packing_core::{UserRole, DEFAULT_ADMIN_LOGIN};

/// Columns added after the first release: (table, column, definition).
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("shipments", "archived", "INTEGER NOT NULL DEFAULT 0"),
    ("shipments", "custom_folder_path", "TEXT"),
    ("shipments", "require_serial_numbers", "INTEGER NOT NULL DEFAULT 0"),
    ("parts", "serial_number", "TEXT"),
    ("parts", "order_number", "TEXT"),
    ("parts", "order_description", "TEXT"),
    ("users", "must_change_password", "INTEGER NOT NULL DEFAULT 0"),
];

/// Statement steps, each idempotent on its own.
const STATEMENTS: &[(&str, &str)] = &[
    (
        "shipment_stats_view",
        r#"
        CREATE VIEW IF NOT EXISTS shipment_stats AS
        SELECT
            s.id AS shipment_id,
            (SELECT COUNT(*) FROM parts p WHERE p.shipment_id = s.id) AS total_parts,
            (SELECT COUNT(*) FROM parts p
                WHERE p.shipment_id = s.id AND p.status = 'packed') AS packed_parts,
            (SELECT COUNT(*) FROM photos ph WHERE ph.shipment_id = s.id) AS photo_count,
            (SELECT CAST(COALESCE(SUM(p.weight_total), 0) AS REAL) FROM parts p
                WHERE p.shipment_id = s.id) AS total_weight
        FROM shipments s
        "#,
    ),
    (
        "unique_active_login",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_active_login ON users(login) WHERE is_active = 1",
    ),
    (
        "shipments_archived_index",
        "CREATE INDEX IF NOT EXISTS idx_shipments_archived ON shipments(archived)",
    ),
];

/// Settings rows inserted when absent.
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("scale_port", ""),
    ("scale_baud_rate", "9600"),
    ("default_require_weight", "false"),
    ("default_require_country", "false"),
    ("default_require_photos", "false"),
    ("default_require_serial_numbers", "false"),
    ("shipments_root", ""),
];

/// Password of the seeded administrator. It must be changed at first login.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// What a migration run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Steps that changed the database.
    pub applied: Vec<String>,
    /// Steps whose change was already present.
    pub unchanged: Vec<String>,
    /// Steps that failed and were skipped.
    pub failed: Vec<String>,
}

impl MigrationReport {
    fn record(&mut self, step: String, outcome: DbResult<bool>) {
        match outcome {
            Ok(true) => {
                info!(step = %step, "Migration applied");
                self.applied.push(step);
            }
            Ok(false) => {
                debug!(step = %step, "Migration already present");
                self.unchanged.push(step);
            }
            Err(e) => {
                let err = DbError::MigrationFailed {
                    step: step.clone(),
                    message: e.to_string(),
                };
                warn!(error = %err, "Migration skipped");
                self.failed.push(step);
            }
        }
    }
}

/// Runs every migration step. Never fails as a whole.
///
/// ## Example
/// ```rust,ignore
/// let report = run_migrations(&pool).await;
/// assert!(report.failed.is_empty());
/// ```
pub async fn run_migrations(pool: &SqlitePool) -> MigrationReport {
    info!("Running database migrations");
    let mut report = MigrationReport::default();

    for (table, column, definition) in ADDED_COLUMNS {
        let outcome = add_column_if_missing(pool, table, column, definition).await;
        report.record(format!("add_column:{table}.{column}"), outcome);
    }

    for (name, sql) in STATEMENTS {
        let outcome = pool.execute(*sql).await.map(|_| false).map_err(DbError::from);
        report.record(name.to_string(), outcome);
    }

    report.record(
        "default_settings".to_string(),
        insert_default_settings(pool).await,
    );
    report.record("seed_admin".to_string(), seed_default_admin(pool).await);

    info!(
        applied = report.applied.len(),
        failed = report.failed.len(),
        "Migrations complete"
    );
    report
}

/// Column names of `table`.
pub async fn table_columns(pool: &SqlitePool, table: &str) -> DbResult<Vec<String>> {
    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
        .bind(table)
        .fetch_all(pool)
        .await?;

    Ok(columns)
}

async fn add_column_if_missing(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    definition: &str,
) -> DbResult<bool> {
    let columns = table_columns(pool, table).await?;
    if columns.is_empty() {
        return Err(DbError::QueryFailed(format!("table {table} does not exist")));
    }
    if columns.iter().any(|c| c == column) {
        return Ok(false);
    }

    // Identifiers come from ADDED_COLUMNS, never from input.
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
    pool.execute(sql.as_str()).await?;
    Ok(true)
}

async fn insert_default_settings(pool: &SqlitePool) -> DbResult<bool> {
    let mut inserted = 0;
    for (key, value) in DEFAULT_SETTINGS {
        let result = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)")
            .bind(*key)
            .bind(*value)
            .execute(pool)
            .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted > 0)
}

async fn seed_default_admin(pool: &SqlitePool) -> DbResult<bool> {
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if users > 0 {
        return Ok(false);
    }

    let hash = hash_password(DEFAULT_ADMIN_PASSWORD)?;
    sqlx::query(
        r#"
        INSERT INTO users (
            id, name, surname, login, password_hash, role,
            is_active, must_change_password, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 1, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind("Administrator")
    .bind("")
    .bind(DEFAULT_ADMIN_LOGIN)
    .bind(hash)
    .bind(UserRole::Admin.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    info!(login = DEFAULT_ADMIN_LOGIN, "Seeded default administrator");
    Ok(true)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use crate::test_support::TempDb;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::path::Path;

    async fn raw_pool(temp: &TempDb) -> SqlitePool {
        let options = SqliteConnectOptions::new()
            .filename(temp.path())
            .create_if_missing(true);
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_steps_do_not_stop_the_rest() {
        let temp = TempDb::new();
        let pool = raw_pool(&temp).await;
        pool.execute("CREATE TABLE settings (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL)")
            .await
            .unwrap();

        let report = run_migrations(&pool).await;

        assert!(report.failed.contains(&"add_column:shipments.archived".to_string()));
        assert!(report.failed.contains(&"seed_admin".to_string()));
        assert!(report.applied.contains(&"default_settings".to_string()));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, DEFAULT_SETTINGS.len() as i64);
    }

    #[tokio::test]
    async fn test_first_release_database_is_upgraded_once() {
        let temp = TempDb::new();
        let pool = raw_pool(&temp).await;
        let schema_file = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schema/schema.sql");
        schema::bootstrap(&pool, Some(schema_file.as_path())).await.unwrap();
        assert!(!table_columns(&pool, "parts")
            .await
            .unwrap()
            .contains(&"serial_number".to_string()));

        let first = run_migrations(&pool).await;
        assert!(first.failed.is_empty(), "failed: {:?}", first.failed);
        assert!(first.applied.contains(&"add_column:parts.serial_number".to_string()));
        assert!(first.applied.contains(&"seed_admin".to_string()));
        assert!(table_columns(&pool, "parts")
            .await
            .unwrap()
            .contains(&"serial_number".to_string()));

        let second = run_migrations(&pool).await;
        assert!(second.failed.is_empty());
        assert!(second.applied.is_empty(), "applied: {:?}", second.applied);
    }
}
