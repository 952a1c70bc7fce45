//! # Shipment Repository
//!
//! Database operations for shipments.
//!
//! ## Key Operations
//! - Create a shipment together with its imported parts (one transaction)
//! - Whitelisted field patches, status changes, archiving
//! - Delete with photo files removed first
//! - Stats from the `shipment_stats` view, output folder derivation

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::credentials::{hash_password, verify_password};
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::non_blank;
use crate::repository::part::insert_part;
use packing_core::folder::shipment_folder;
use packing_core::validation::{validate_destination, validate_quantity, validate_shipment_number};
use packing_core::{
    CoreError, ImportedPart, NewShipment, Part, PartStatus, Shipment, ShipmentFilter,
    ShipmentPatch, ShipmentStats, ShipmentStatus, ValidationError, DEFAULT_PART_UNIT,
};

const SHIPMENT_COLUMNS: &str = "id, shipment_number, destination, status, require_weight, \
     require_country, require_photos, require_serial_numbers, password_hash, custom_folder_path, \
     archived, notes, created_by, created_at, updated_at, completed_at";

/// Repository for shipment database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.shipments();
///
/// let shipment = repo.create(new_shipment, &imported_parts).await?;
/// let stats = repo.stats(&shipment.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ShipmentRepository {
    db: Database,
}

impl ShipmentRepository {
    /// Creates a new ShipmentRepository.
    pub fn new(db: Database) -> Self {
        ShipmentRepository { db }
    }

    /// Creates a shipment and its parts in one transaction.
    ///
    /// Either the shipment and every part are stored, or nothing is.
    pub async fn create(&self, new: NewShipment, parts: &[ImportedPart]) -> DbResult<Shipment> {
        validate_shipment_number(&new.shipment_number)?;
        validate_destination(&new.destination)?;
        for part in parts {
            validate_quantity(part.quantity)?;
            if part.description.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: format!("description (row {})", part.row_number),
                }
                .into());
            }
        }

        let password_hash = match non_blank(new.password) {
            Some(password) => Some(hash_password(&password)?),
            None => None,
        };

        let now = Utc::now();
        let shipment = Shipment {
            id: Uuid::new_v4().to_string(),
            shipment_number: new.shipment_number.trim().to_string(),
            destination: new.destination.trim().to_string(),
            status: ShipmentStatus::InProgress,
            require_weight: new.require_weight,
            require_country: new.require_country,
            require_photos: new.require_photos,
            require_serial_numbers: new.require_serial_numbers,
            password_hash,
            custom_folder_path: non_blank(new.custom_folder_path),
            archived: false,
            notes: non_blank(new.notes),
            created_by: non_blank(new.created_by),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let rows: Vec<Part> = parts
            .iter()
            .map(|p| new_part(&shipment.id, p, now))
            .collect();

        debug!(
            shipment_number = %shipment.shipment_number,
            parts = rows.len(),
            "Creating shipment"
        );

        let record = shipment.clone();
        self.db
            .transaction(move |tx| {
                Box::pin(async move {
                    insert_shipment(tx.conn(), &record).await?;
                    for part in &rows {
                        insert_part(tx.conn(), part).await?;
                    }
                    Ok(())
                })
            })
            .await?;

        info!(id = %shipment.id, number = %shipment.shipment_number, "Shipment created");
        Ok(shipment)
    }

    /// Gets a shipment by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shipment>> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = ?1");
        let shipment = sqlx::query_as::<_, Shipment>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(shipment)
    }

    /// Like [`get_by_id`](Self::get_by_id) but a missing shipment is an error.
    pub async fn require(&self, id: &str) -> DbResult<Shipment> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Shipment", id))
    }

    /// Lists shipments, newest first.
    pub async fn list(&self, filter: &ShipmentFilter) -> DbResult<Vec<Shipment>> {
        let sql = format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments \
             WHERE (?1 OR archived = 0) AND (?2 IS NULL OR status = ?2) \
             ORDER BY created_at DESC"
        );
        let shipments = sqlx::query_as::<_, Shipment>(&sql)
            .bind(filter.include_archived)
            .bind(filter.status)
            .fetch_all(self.db.pool())
            .await?;

        debug!(count = shipments.len(), "Listed shipments");
        Ok(shipments)
    }

    /// Applies a field patch. Fields not in [`ShipmentPatch`] cannot change.
    ///
    /// A completed shipment only takes status and archive changes unless the
    /// same patch reopens it.
    pub async fn update(&self, id: &str, patch: &ShipmentPatch) -> DbResult<Shipment> {
        let mut shipment = self.require(id).await?;
        if patch.is_empty() {
            return Ok(shipment);
        }

        let reopens = patch.status.is_some_and(|s| s != ShipmentStatus::Completed);
        if !shipment.is_editable() && !reopens && patch.edits_content() {
            return Err(CoreError::ShipmentCompleted(shipment.id).into());
        }

        let previous_status = shipment.status;
        apply_patch(&mut shipment, patch)?;
        if shipment.status != previous_status {
            self.transition(&mut shipment).await?;
        }
        shipment.updated_at = Utc::now();

        self.write(&shipment).await?;
        debug!(id = %id, "Shipment updated");
        Ok(shipment)
    }

    /// Changes the status. Completing requires every part to be packed.
    pub async fn set_status(&self, id: &str, status: ShipmentStatus) -> DbResult<Shipment> {
        let mut shipment = self.require(id).await?;
        if shipment.status == status {
            return Ok(shipment);
        }

        shipment.status = status;
        self.transition(&mut shipment).await?;
        shipment.updated_at = Utc::now();

        self.write(&shipment).await?;
        info!(id = %id, status = status.as_str(), "Shipment status changed");
        Ok(shipment)
    }

    pub async fn archive(&self, id: &str) -> DbResult<()> {
        self.set_archived(id, true).await
    }

    pub async fn unarchive(&self, id: &str) -> DbResult<()> {
        self.set_archived(id, false).await
    }

    async fn set_archived(&self, id: &str, archived: bool) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE shipments SET archived = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(archived)
                .bind(Utc::now())
                .execute(self.db.pool())
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Shipment", id));
        }

        self.db.snapshot_if_due().await
    }

    /// Sets or removes (`None` or blank) the shipment password.
    pub async fn set_password(&self, id: &str, password: Option<&str>) -> DbResult<()> {
        let hash = match password.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => Some(hash_password(p)?),
            None => None,
        };

        let result =
            sqlx::query("UPDATE shipments SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(hash)
                .bind(Utc::now())
                .execute(self.db.pool())
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Shipment", id));
        }

        self.db.snapshot_if_due().await
    }

    /// Checks a candidate password. Unprotected shipments accept anything.
    pub async fn verify_password(&self, id: &str, candidate: &str) -> DbResult<bool> {
        let shipment = self.require(id).await?;

        Ok(match shipment.password_hash.as_deref() {
            Some(hash) => verify_password(candidate, hash),
            None => true,
        })
    }

    /// Deletes the shipment, its parts and photos.
    ///
    /// Photo files are removed first; files already gone are skipped. The
    /// rows go in one transaction.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let id = id.to_string();

        let removed = self
            .db
            .transaction(move |tx| {
                Box::pin(async move {
                    let paths: Vec<String> =
                        sqlx::query_scalar("SELECT file_path FROM photos WHERE shipment_id = ?1")
                            .bind(&id)
                            .fetch_all(tx.conn())
                            .await?;

                    for path in &paths {
                        remove_photo_file(path)?;
                    }

                    let result = sqlx::query("DELETE FROM shipments WHERE id = ?1")
                        .bind(&id)
                        .execute(tx.conn())
                        .await?;
                    if result.rows_affected() == 0 {
                        return Err(DbError::not_found("Shipment", id));
                    }

                    info!(id = %id, photos = paths.len(), "Shipment deleted");
                    Ok(paths.len())
                })
            })
            .await?;

        debug!(photos = removed, "Photo files removed");
        Ok(())
    }

    /// Aggregates from the `shipment_stats` view.
    pub async fn stats(&self, id: &str) -> DbResult<ShipmentStats> {
        sqlx::query_as::<_, ShipmentStats>(
            r#"
            SELECT shipment_id, total_parts, packed_parts, photo_count, total_weight
            FROM shipment_stats
            WHERE shipment_id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| DbError::not_found("Shipment", id))
    }

    /// Folder for this shipment's photos and reports under `root`.
    pub async fn output_folder(&self, id: &str, root: &Path) -> DbResult<PathBuf> {
        let shipment = self.require(id).await?;

        Ok(shipment_folder(
            root,
            &shipment.shipment_number,
            &shipment.destination,
            shipment.created_at.date_naive(),
            shipment.custom_folder_path.as_deref(),
        ))
    }

    /// Keeps `completed_at` in step with the status and refuses to complete a
    /// shipment that still has pending parts.
    async fn transition(&self, shipment: &mut Shipment) -> DbResult<()> {
        if shipment.status == ShipmentStatus::Completed {
            let stats = self.stats(&shipment.id).await?;
            if !stats.is_fully_packed() {
                return Err(CoreError::PartsPending {
                    shipment_id: shipment.id.clone(),
                    pending: stats.pending_parts(),
                }
                .into());
            }
            shipment.completed_at = Some(Utc::now());
        } else {
            shipment.completed_at = None;
        }
        Ok(())
    }

    async fn write(&self, shipment: &Shipment) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE shipments SET
                shipment_number = ?2,
                destination = ?3,
                status = ?4,
                require_weight = ?5,
                require_country = ?6,
                require_photos = ?7,
                require_serial_numbers = ?8,
                custom_folder_path = ?9,
                archived = ?10,
                notes = ?11,
                updated_at = ?12,
                completed_at = ?13
            WHERE id = ?1
            "#,
        )
        .bind(&shipment.id)
        .bind(&shipment.shipment_number)
        .bind(&shipment.destination)
        .bind(shipment.status)
        .bind(shipment.require_weight)
        .bind(shipment.require_country)
        .bind(shipment.require_photos)
        .bind(shipment.require_serial_numbers)
        .bind(&shipment.custom_folder_path)
        .bind(shipment.archived)
        .bind(&shipment.notes)
        .bind(shipment.updated_at)
        .bind(shipment.completed_at)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Shipment", &shipment.id));
        }

        self.db.snapshot_if_due().await
    }
}

fn apply_patch(shipment: &mut Shipment, patch: &ShipmentPatch) -> DbResult<()> {
    if let Some(number) = &patch.shipment_number {
        validate_shipment_number(number)?;
        shipment.shipment_number = number.trim().to_string();
    }
    if let Some(destination) = &patch.destination {
        validate_destination(destination)?;
        shipment.destination = destination.trim().to_string();
    }
    if let Some(status) = patch.status {
        shipment.status = status;
    }
    if let Some(flag) = patch.require_weight {
        shipment.require_weight = flag;
    }
    if let Some(flag) = patch.require_country {
        shipment.require_country = flag;
    }
    if let Some(flag) = patch.require_photos {
        shipment.require_photos = flag;
    }
    if let Some(flag) = patch.require_serial_numbers {
        shipment.require_serial_numbers = flag;
    }
    if let Some(path) = &patch.custom_folder_path {
        shipment.custom_folder_path = non_blank(Some(path.clone()));
    }
    if let Some(notes) = &patch.notes {
        shipment.notes = non_blank(Some(notes.clone()));
    }
    if let Some(archived) = patch.archived {
        shipment.archived = archived;
    }
    Ok(())
}

fn new_part(shipment_id: &str, imported: &ImportedPart, now: chrono::DateTime<Utc>) -> Part {
    let unit = imported.unit.trim();

    Part {
        id: Uuid::new_v4().to_string(),
        shipment_id: shipment_id.to_string(),
        sap_index: imported.sap_index.trim().to_string(),
        description: imported.description.trim().to_string(),
        quantity: imported.quantity,
        unit: if unit.is_empty() {
            DEFAULT_PART_UNIT.to_string()
        } else {
            unit.to_string()
        },
        status: PartStatus::Pending,
        packed_at: None,
        weight_per_unit: None,
        weight_total: None,
        country: non_blank(imported.country.clone()),
        order_number: non_blank(imported.order_number.clone()),
        order_description: non_blank(imported.order_description.clone()),
        serial_number: None,
        row_number: imported.row_number,
        created_at: now,
        updated_at: now,
    }
}

async fn insert_shipment(conn: &mut sqlx::SqliteConnection, shipment: &Shipment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shipments (
            id, shipment_number, destination, status,
            require_weight, require_country, require_photos, require_serial_numbers,
            password_hash, custom_folder_path, archived, notes, created_by,
            created_at, updated_at, completed_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7, ?8,
            ?9, ?10, ?11, ?12, ?13,
            ?14, ?15, ?16
        )
        "#,
    )
    .bind(&shipment.id)
    .bind(&shipment.shipment_number)
    .bind(&shipment.destination)
    .bind(shipment.status)
    .bind(shipment.require_weight)
    .bind(shipment.require_country)
    .bind(shipment.require_photos)
    .bind(shipment.require_serial_numbers)
    .bind(&shipment.password_hash)
    .bind(&shipment.custom_folder_path)
    .bind(shipment.archived)
    .bind(&shipment.notes)
    .bind(&shipment.created_by)
    .bind(shipment.created_at)
    .bind(shipment.updated_at)
    .bind(shipment.completed_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Removes a photo file; a file that is already gone is not an error.
pub(crate) fn remove_photo_file(path: &str) -> DbResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path, "Photo file already missing");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{imported, new_shipment, TempDb};

    #[tokio::test]
    async fn test_create_stores_shipment_and_parts() {
        let temp = TempDb::new();
        let db = temp.open().await;

        let parts = vec![
            imported("100200", "Bearing", 4.0, 2),
            imported("", "Loose bolts", 10.0, 3),
        ];
        let shipment = db
            .shipments()
            .create(new_shipment("SH-001"), &parts)
            .await
            .unwrap();

        let loaded = db.shipments().require(&shipment.id).await.unwrap();
        assert_eq!(loaded.shipment_number, "SH-001");
        assert_eq!(loaded.status, ShipmentStatus::InProgress);
        assert!(!loaded.is_protected());

        let stored = db.parts().list_for_shipment(&shipment.id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].unit, "pcs");
        assert!(stored[1].is_unassigned());
    }

    #[tokio::test]
    async fn test_create_with_invalid_part_stores_nothing() {
        let temp = TempDb::new();
        let db = temp.open().await;

        let parts = vec![imported("1", "Ok", 1.0, 1), imported("2", "Bad", -1.0, 2)];
        let err = db
            .shipments()
            .create(new_shipment("SH-002"), &parts)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let all = db
            .shipments()
            .list(&ShipmentFilter {
                include_archived: true,
                status: None,
            })
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_update_patch_and_clear_fields() {
        let temp = TempDb::new();
        let db = temp.open().await;
        let mut new = new_shipment("SH-003");
        new.notes = Some("fragile".to_string());
        let shipment = db.shipments().create(new, &[]).await.unwrap();

        let patch = ShipmentPatch {
            destination: Some("Rotterdam".to_string()),
            require_weight: Some(true),
            notes: Some(String::new()),
            ..Default::default()
        };
        let updated = db.shipments().update(&shipment.id, &patch).await.unwrap();
        assert_eq!(updated.destination, "Rotterdam");
        assert!(updated.require_weight);
        assert_eq!(updated.notes, None);
        assert_eq!(updated.shipment_number, "SH-003");

        let bad = ShipmentPatch {
            shipment_number: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(db.shipments().update(&shipment.id, &bad).await.is_err());
    }

    #[tokio::test]
    async fn test_complete_requires_all_parts_packed() {
        let temp = TempDb::new();
        let db = temp.open().await;
        let shipment = db
            .shipments()
            .create(new_shipment("SH-004"), &[imported("1", "Gear", 1.0, 1)])
            .await
            .unwrap();

        let err = db
            .shipments()
            .set_status(&shipment.id, ShipmentStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::PartsPending { pending: 1, .. })));

        let part = &db.parts().list_for_shipment(&shipment.id).await.unwrap()[0];
        db.parts().pack(&part.id).await.unwrap();

        let completed = db
            .shipments()
            .set_status(&shipment.id, ShipmentStatus::Completed)
            .await
            .unwrap();
        assert!(completed.completed_at.is_some());

        let reopened = db
            .shipments()
            .set_status(&shipment.id, ShipmentStatus::InProgress)
            .await
            .unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_completed_shipment_rejects_edits() {
        let temp = TempDb::new();
        let db = temp.open().await;
        let open = db.shipments().create(new_shipment("SH-008"), &[]).await.unwrap();
        let done = db
            .shipments()
            .create(new_shipment("SH-009"), &[imported("1", "Gear", 1.0, 1)])
            .await
            .unwrap();
        let gear = &db.parts().list_for_shipment(&done.id).await.unwrap()[0];
        db.parts().pack(&gear.id).await.unwrap();
        db.shipments()
            .set_status(&done.id, ShipmentStatus::Completed)
            .await
            .unwrap();

        let rename = ShipmentPatch {
            destination: Some("Oslo".to_string()),
            ..Default::default()
        };
        let err = db.shipments().update(&done.id, &rename).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::ShipmentCompleted(_))));

        let archive = ShipmentPatch {
            archived: Some(true),
            ..Default::default()
        };
        assert!(db.shipments().update(&done.id, &archive).await.unwrap().archived);

        let reopen_and_rename = ShipmentPatch {
            status: Some(ShipmentStatus::InProgress),
            ..rename.clone()
        };
        let reopened = db.shipments().update(&done.id, &reopen_and_rename).await.unwrap();
        assert_eq!(reopened.destination, "Oslo");
        assert!(reopened.completed_at.is_none());

        // Open shipments are unaffected.
        assert!(db.shipments().update(&open.id, &rename).await.is_ok());
    }

    #[tokio::test]
    async fn test_archive_hides_from_default_list() {
        let temp = TempDb::new();
        let db = temp.open().await;
        let a = db.shipments().create(new_shipment("A"), &[]).await.unwrap();
        db.shipments().create(new_shipment("B"), &[]).await.unwrap();

        db.shipments().archive(&a.id).await.unwrap();
        let visible = db.shipments().list(&ShipmentFilter::default()).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].shipment_number, "B");

        db.shipments().unarchive(&a.id).await.unwrap();
        let visible = db.shipments().list(&ShipmentFilter::default()).await.unwrap();
        assert_eq!(visible.len(), 2);

        let paused = db
            .shipments()
            .list(&ShipmentFilter {
                include_archived: false,
                status: Some(ShipmentStatus::Paused),
            })
            .await
            .unwrap();
        assert!(paused.is_empty());
    }

    #[tokio::test]
    async fn test_password_protection() {
        let temp = TempDb::new();
        let db = temp.open().await;
        let mut new = new_shipment("SH-005");
        new.password = Some("lock".to_string());
        let shipment = db.shipments().create(new, &[]).await.unwrap();

        assert!(shipment.is_protected());
        assert!(db.shipments().verify_password(&shipment.id, "lock").await.unwrap());
        assert!(!db.shipments().verify_password(&shipment.id, "nope").await.unwrap());

        db.shipments().set_password(&shipment.id, None).await.unwrap();
        assert!(db.shipments().verify_password(&shipment.id, "").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_removes_rows_and_photo_files() {
        let temp = TempDb::new();
        let db = temp.open().await;
        let shipment = db
            .shipments()
            .create(new_shipment("SH-006"), &[imported("1", "Valve", 2.0, 1)])
            .await
            .unwrap();
        let part = db.parts().list_for_shipment(&shipment.id).await.unwrap().remove(0);

        let kept = temp.dir().join("kept.jpg");
        std::fs::write(&kept, b"jpeg").unwrap();
        let missing = temp.dir().join("missing.jpg");
        db.photos()
            .add(&part.id, kept.to_str().unwrap(), 4)
            .await
            .unwrap();
        db.photos()
            .add(&part.id, missing.to_str().unwrap(), 0)
            .await
            .unwrap();

        db.shipments().delete(&shipment.id).await.unwrap();

        assert!(!kept.exists());
        assert!(db.shipments().get_by_id(&shipment.id).await.unwrap().is_none());
        assert!(db.parts().get_by_id(&part.id).await.unwrap().is_none());
        assert!(db.photos().list_for_shipment(&shipment.id).await.unwrap().is_empty());

        let err = db.shipments().delete(&shipment.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_stats_and_output_folder() {
        let temp = TempDb::new();
        let db = temp.open().await;
        let shipment = db
            .shipments()
            .create(
                new_shipment("SH/007"),
                &[imported("1", "Gear", 2.0, 1), imported("2", "Shaft", 1.0, 2)],
            )
            .await
            .unwrap();
        let parts = db.parts().list_for_shipment(&shipment.id).await.unwrap();
        db.parts().record_weight(&parts[0].id, 1.5).await.unwrap();
        db.parts().pack(&parts[0].id).await.unwrap();

        let stats = db.shipments().stats(&shipment.id).await.unwrap();
        assert_eq!(stats.total_parts, 2);
        assert_eq!(stats.packed_parts, 1);
        assert_eq!(stats.photo_count, 0);
        assert_eq!(stats.total_weight, 3.0);

        let folder = db
            .shipments()
            .output_folder(&shipment.id, Path::new("/data"))
            .await
            .unwrap();
        let expected = format!(
            "SH_007_Hamburg_{}",
            shipment.created_at.date_naive().format("%Y-%m-%d")
        );
        assert_eq!(folder, Path::new("/data").join("shipments").join(expected));
    }
}
