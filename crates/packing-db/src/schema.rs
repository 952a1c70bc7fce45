//! # Schema Bootstrap
//!
//! A new database file is created from `schema/schema.sql`.
//!
//! ## Where the file is looked up
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  explicit override set?                                                 │
//! │     yes ──► only that path                                              │
//! │     no  ──► 1. <workspace>/schema/schema.sql      (development)         │
//! │             2. <exe dir>/resources/schema.sql     (installed)           │
//! │                                                                         │
//! │  nothing found ──► DbError::SchemaNotFound (startup aborts)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{Executor, SqlitePool};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// File name of the bootstrap schema.
pub const SCHEMA_FILE_NAME: &str = "schema.sql";

/// Paths searched for the schema, in order.
pub fn candidate_paths(override_path: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = override_path {
        return vec![path.to_path_buf()];
    }

    let mut paths = vec![Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("schema")
        .join(SCHEMA_FILE_NAME)];

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(exe_dir.join("resources").join(SCHEMA_FILE_NAME));
    }

    paths
}

/// Finds the first existing schema file.
pub fn locate(override_path: Option<&Path>) -> DbResult<PathBuf> {
    let candidates = candidate_paths(override_path);

    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| DbError::SchemaNotFound {
            searched: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// True when the database has no tables of its own yet.
pub async fn is_empty(pool: &SqlitePool) -> DbResult<bool> {
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_one(pool)
    .await?;

    Ok(tables == 0)
}

/// Applies the bootstrap schema to an empty database.
pub async fn bootstrap(pool: &SqlitePool, override_path: Option<&Path>) -> DbResult<()> {
    let path = locate(override_path)?;
    debug!(path = %path.display(), "Reading schema");

    let sql = std::fs::read_to_string(&path)?;
    pool.execute(sql.as_str()).await?;

    info!(path = %path.display(), "Schema applied");
    Ok(())
}
