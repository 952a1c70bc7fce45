//! # Photo Repository
//!
//! Photo evidence attached to parts. A photo is a file on disk plus a row;
//! deleting removes the file first, then the row.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::shipment::remove_photo_file;
use packing_core::{Photo, ValidationError};

const PHOTO_COLUMNS: &str = "id, part_id, shipment_id, file_path, file_size, taken_at";

/// Repository for photo database operations.
#[derive(Debug, Clone)]
pub struct PhotoRepository {
    db: Database,
}

impl PhotoRepository {
    /// Creates a new PhotoRepository.
    pub fn new(db: Database) -> Self {
        PhotoRepository { db }
    }

    /// Records a photo already written to `file_path`.
    pub async fn add(&self, part_id: &str, file_path: &str, file_size: i64) -> DbResult<Photo> {
        if file_path.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "file_path".to_string(),
            }
            .into());
        }

        let shipment_id: String = sqlx::query_scalar("SELECT shipment_id FROM parts WHERE id = ?1")
            .bind(part_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| DbError::not_found("Part", part_id))?;

        let photo = Photo {
            id: Uuid::new_v4().to_string(),
            part_id: part_id.to_string(),
            shipment_id,
            file_path: file_path.to_string(),
            file_size: file_size.max(0),
            taken_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO photos (id, part_id, shipment_id, file_path, file_size, taken_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&photo.id)
        .bind(&photo.part_id)
        .bind(&photo.shipment_id)
        .bind(&photo.file_path)
        .bind(photo.file_size)
        .bind(photo.taken_at)
        .execute(self.db.pool())
        .await?;

        self.db.snapshot_if_due().await?;
        debug!(id = %photo.id, part_id = %part_id, "Photo added");
        Ok(photo)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Photo>> {
        let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1");
        let photo = sqlx::query_as::<_, Photo>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(photo)
    }

    pub async fn list_for_part(&self, part_id: &str) -> DbResult<Vec<Photo>> {
        let sql =
            format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE part_id = ?1 ORDER BY taken_at");
        let photos = sqlx::query_as::<_, Photo>(&sql)
            .bind(part_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(photos)
    }

    pub async fn list_for_shipment(&self, shipment_id: &str) -> DbResult<Vec<Photo>> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE shipment_id = ?1 ORDER BY taken_at"
        );
        let photos = sqlx::query_as::<_, Photo>(&sql)
            .bind(shipment_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(photos)
    }

    /// Deletes the file, then the row. A missing file is tolerated.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let photo = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Photo", id))?;

        remove_photo_file(&photo.file_path)?;

        sqlx::query("DELETE FROM photos WHERE id = ?1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        self.db.snapshot_if_due().await?;
        info!(id = %id, path = %photo.file_path, "Photo deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
