//! # Part Repository
//!
//! Database operations for the line items of a shipment.
//!
//! ## Pack Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  scan SAP index ──► find_by_sap_index ──► (scale) record_weight         │
//! │                                              │                          │
//! │                          (OCR) record_serial_number                     │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                     pack: Part::check_packable(shipment)                │
//! │                       ├── shipment completed?  → refused                │
//! │                       ├── weight required?     → must be recorded       │
//! │                       ├── country required?    → must be set            │
//! │                       └── serial required?     → must be set            │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                          status = packed, packed_at = now               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::non_blank;
use packing_core::validation::{validate_quantity, validate_weight};
use packing_core::{
    line_weight, CoreError, OcrResult, Part, PartPatch, PartStatus, ValidationError,
    DEFAULT_PART_UNIT,
};

const PART_COLUMNS: &str = "id, shipment_id, sap_index, description, quantity, unit, status, \
     packed_at, weight_per_unit, weight_total, country, order_number, order_description, \
     serial_number, row_number, created_at, updated_at";

/// Repository for part database operations.
#[derive(Debug, Clone)]
pub struct PartRepository {
    db: Database,
}

impl PartRepository {
    /// Creates a new PartRepository.
    pub fn new(db: Database) -> Self {
        PartRepository { db }
    }

    /// Parts of a shipment in spreadsheet order.
    pub async fn list_for_shipment(&self, shipment_id: &str) -> DbResult<Vec<Part>> {
        let sql = format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE shipment_id = ?1 ORDER BY row_number, created_at"
        );
        let parts = sqlx::query_as::<_, Part>(&sql)
            .bind(shipment_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(parts)
    }

    /// Gets a part by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Part>> {
        let sql = format!("SELECT {PART_COLUMNS} FROM parts WHERE id = ?1");
        let part = sqlx::query_as::<_, Part>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(part)
    }

    async fn require(&self, id: &str) -> DbResult<Part> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Part", id))
    }

    /// Loads a part whose shipment still accepts changes.
    async fn require_editable(&self, id: &str) -> DbResult<Part> {
        let part = self.require(id).await?;
        let shipment = self.db.shipments().require(&part.shipment_id).await?;

        if !shipment.is_editable() {
            return Err(CoreError::ShipmentCompleted(shipment.id).into());
        }
        Ok(part)
    }

    /// First part with this SAP index, pending parts before packed ones.
    ///
    /// Blank indexes never match: unassigned parts are packed by hand.
    pub async fn find_by_sap_index(
        &self,
        shipment_id: &str,
        sap_index: &str,
    ) -> DbResult<Option<Part>> {
        let sap_index = sap_index.trim();
        if sap_index.is_empty() {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {PART_COLUMNS} FROM parts \
             WHERE shipment_id = ?1 AND sap_index = ?2 \
             ORDER BY CASE status WHEN 'pending' THEN 0 ELSE 1 END, row_number \
             LIMIT 1"
        );
        let part = sqlx::query_as::<_, Part>(&sql)
            .bind(shipment_id)
            .bind(sap_index)
            .fetch_optional(self.db.pool())
            .await?;

        debug!(sap_index = %sap_index, found = part.is_some(), "SAP index lookup");
        Ok(part)
    }

    /// Number of parts not yet packed.
    pub async fn pending_count(&self, shipment_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM parts WHERE shipment_id = ?1 AND status = 'pending'",
        )
        .bind(shipment_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(count)
    }

    /// Marks a part packed once the shipment's requirements are met.
    pub async fn pack(&self, id: &str) -> DbResult<Part> {
        let mut part = self.require(id).await?;
        let shipment = self.db.shipments().require(&part.shipment_id).await?;

        part.check_packable(&shipment)?;
        if part.is_packed() {
            return Ok(part);
        }

        let now = Utc::now();
        part.status = PartStatus::Packed;
        part.packed_at = Some(now);
        part.updated_at = now;
        self.write(&part).await?;

        info!(id = %id, sap_index = %part.sap_index, "Part packed");
        Ok(part)
    }

    /// Returns a part to pending.
    pub async fn unpack(&self, id: &str) -> DbResult<Part> {
        let mut part = self.require_editable(id).await?;
        if !part.is_packed() {
            return Ok(part);
        }

        part.status = PartStatus::Pending;
        part.packed_at = None;
        part.updated_at = Utc::now();
        self.write(&part).await?;

        info!(id = %id, "Part unpacked");
        Ok(part)
    }

    /// Stores a unit weight (kg) and the derived line weight.
    pub async fn record_weight(&self, id: &str, weight_per_unit: f64) -> DbResult<Part> {
        validate_weight(weight_per_unit)?;
        let mut part = self.require_editable(id).await?;

        part.weight_per_unit = Some(weight_per_unit);
        part.weight_total = Some(line_weight(weight_per_unit, part.quantity));
        part.updated_at = Utc::now();
        self.write(&part).await?;

        debug!(id = %id, weight_per_unit, "Weight recorded");
        Ok(part)
    }

    /// Stores the serial number read by OCR.
    pub async fn record_serial_number(&self, id: &str, ocr: &OcrResult) -> DbResult<Part> {
        let serial = ocr.primary_text().ok_or_else(|| ValidationError::Required {
            field: "serial_number".to_string(),
        })?;

        let mut part = self.require_editable(id).await?;
        part.serial_number = Some(serial.to_string());
        part.updated_at = Utc::now();
        self.write(&part).await?;

        debug!(id = %id, serial = %serial, confidence = ocr.confidence, "Serial number recorded");
        Ok(part)
    }

    /// Applies a field patch. `Some("")` clears the optional text fields.
    pub async fn update(&self, id: &str, patch: &PartPatch) -> DbResult<Part> {
        let mut part = self.require_editable(id).await?;

        if let Some(sap_index) = &patch.sap_index {
            part.sap_index = sap_index.trim().to_string();
        }
        if let Some(description) = &patch.description {
            if description.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: "description".to_string(),
                }
                .into());
            }
            part.description = description.trim().to_string();
        }
        if let Some(quantity) = patch.quantity {
            validate_quantity(quantity)?;
            part.quantity = quantity;
            part.weight_total = part.weight_per_unit.map(|w| line_weight(w, quantity));
        }
        if let Some(unit) = &patch.unit {
            part.unit =
                non_blank(Some(unit.clone())).unwrap_or_else(|| DEFAULT_PART_UNIT.to_string());
        }
        if let Some(country) = &patch.country {
            part.country = non_blank(Some(country.clone()));
        }
        if let Some(order_number) = &patch.order_number {
            part.order_number = non_blank(Some(order_number.clone()));
        }
        if let Some(order_description) = &patch.order_description {
            part.order_description = non_blank(Some(order_description.clone()));
        }
        if let Some(serial_number) = &patch.serial_number {
            part.serial_number = non_blank(Some(serial_number.clone()));
        }

        part.updated_at = Utc::now();
        self.write(&part).await?;
        Ok(part)
    }

    async fn write(&self, part: &Part) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE parts SET
                sap_index = ?2,
                description = ?3,
                quantity = ?4,
                unit = ?5,
                status = ?6,
                packed_at = ?7,
                weight_per_unit = ?8,
                weight_total = ?9,
                country = ?10,
                order_number = ?11,
                order_description = ?12,
                serial_number = ?13,
                updated_at = ?14
            WHERE id = ?1
            "#,
        )
        .bind(&part.id)
        .bind(&part.sap_index)
        .bind(&part.description)
        .bind(part.quantity)
        .bind(&part.unit)
        .bind(part.status)
        .bind(part.packed_at)
        .bind(part.weight_per_unit)
        .bind(part.weight_total)
        .bind(&part.country)
        .bind(&part.order_number)
        .bind(&part.order_description)
        .bind(&part.serial_number)
        .bind(part.updated_at)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Part", &part.id));
        }

        self.db.snapshot_if_due().await
    }
}

/// Inserts a part on an open connection (used inside transactions).
pub(crate) async fn insert_part(conn: &mut SqliteConnection, part: &Part) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO parts (
            id, shipment_id, sap_index, description, quantity, unit, status,
            packed_at, weight_per_unit, weight_total, country,
            order_number, order_description, serial_number, row_number,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            ?8, ?9, ?10, ?11,
            ?12, ?13, ?14, ?15,
            ?16, ?17
        )
        "#,
    )
    .bind(&part.id)
    .bind(&part.shipment_id)
    .bind(&part.sap_index)
    .bind(&part.description)
    .bind(part.quantity)
    .bind(&part.unit)
    .bind(part.status)
    .bind(part.packed_at)
    .bind(part.weight_per_unit)
    .bind(part.weight_total)
    .bind(&part.country)
    .bind(&part.order_number)
    .bind(&part.order_description)
    .bind(&part.serial_number)
    .bind(part.row_number)
    .bind(part.created_at)
    .bind(part.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{imported, new_shipment, TempDb};
    use packing_core::{Shipment, ShipmentPatch};

    async fn setup(temp: &TempDb) -> (Database, Shipment, Vec<Part>) {
        let db = temp.open().await;
        let shipment = db
            .shipments()
            .create(
                new_shipment("SH-100"),
                &[
                    imported("500", "Pump", 2.0, 1),
                    imported("600", "Hose", 3.0, 2),
                    imported("500", "Pump spare", 1.0, 3),
                ],
            )
            .await
            .unwrap();
        let parts = db.parts().list_for_shipment(&shipment.id).await.unwrap();
        (db, shipment, parts)
    }

    #[tokio::test]
    async fn test_pack_and_unpack() {
        let temp = TempDb::new();
        let (db, shipment, parts) = setup(&temp).await;

        let packed = db.parts().pack(&parts[0].id).await.unwrap();
        assert!(packed.is_packed());
        assert!(packed.packed_at.is_some());
        assert_eq!(db.parts().pending_count(&shipment.id).await.unwrap(), 2);

        let unpacked = db.parts().unpack(&parts[0].id).await.unwrap();
        assert_eq!(unpacked.status, PartStatus::Pending);
        assert!(unpacked.packed_at.is_none());
        assert_eq!(db.parts().pending_count(&shipment.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_pack_enforces_weight_requirement() {
        let temp = TempDb::new();
        let (db, shipment, parts) = setup(&temp).await;
        db.shipments()
            .update(
                &shipment.id,
                &ShipmentPatch {
                    require_weight: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = db.parts().pack(&parts[1].id).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::RequirementNotMet { .. })));

        let weighed = db.parts().record_weight(&parts[1].id, 0.4).await.unwrap();
        assert_eq!(weighed.weight_total, Some(1.2));
        assert!(db.parts().pack(&parts[1].id).await.is_ok());
    }

    #[tokio::test]
    async fn test_record_weight_rejects_negative() {
        let temp = TempDb::new();
        let (db, _, parts) = setup(&temp).await;

        let err = db.parts().record_weight(&parts[0].id, -1.0).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_find_by_sap_index_prefers_pending() {
        let temp = TempDb::new();
        let (db, shipment, parts) = setup(&temp).await;

        let first = db
            .parts()
            .find_by_sap_index(&shipment.id, " 500 ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id, parts[0].id);

        db.parts().pack(&parts[0].id).await.unwrap();
        let next = db
            .parts()
            .find_by_sap_index(&shipment.id, "500")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.id, parts[2].id);

        assert!(db.parts().find_by_sap_index(&shipment.id, "").await.unwrap().is_none());
        assert!(db.parts().find_by_sap_index(&shipment.id, "999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_patch_recomputes_line_weight() {
        let temp = TempDb::new();
        let (db, _, parts) = setup(&temp).await;
        db.parts().record_weight(&parts[0].id, 2.5).await.unwrap();

        let patch = PartPatch {
            quantity: Some(4.0),
            country: Some("PL".to_string()),
            unit: Some(String::new()),
            ..Default::default()
        };
        let updated = db.parts().update(&parts[0].id, &patch).await.unwrap();
        assert_eq!(updated.weight_total, Some(10.0));
        assert_eq!(updated.country.as_deref(), Some("PL"));
        assert_eq!(updated.unit, "pcs");

        let clear = PartPatch {
            country: Some(String::new()),
            ..Default::default()
        };
        let cleared = db.parts().update(&parts[0].id, &clear).await.unwrap();
        assert_eq!(cleared.country, None);
    }

    #[tokio::test]
    async fn test_record_serial_number_from_ocr() {
        let temp = TempDb::new();
        let (db, _, parts) = setup(&temp).await;

        let ocr = OcrResult {
            text: "SN 4711\nMade in EU".to_string(),
            lines: vec!["SN 4711".to_string(), "Made in EU".to_string()],
            confidence: 88.0,
        };
        let part = db.parts().record_serial_number(&parts[0].id, &ocr).await.unwrap();
        assert_eq!(part.serial_number.as_deref(), Some("SN 4711"));

        let empty = OcrResult::default();
        assert!(db.parts().record_serial_number(&parts[0].id, &empty).await.is_err());
    }

    #[tokio::test]
    async fn test_completed_shipment_is_frozen() {
        let temp = TempDb::new();
        let (db, shipment, parts) = setup(&temp).await;
        for part in &parts {
            db.parts().pack(&part.id).await.unwrap();
        }
        db.shipments()
            .set_status(&shipment.id, packing_core::ShipmentStatus::Completed)
            .await
            .unwrap();

        let frozen = |err: DbError| matches!(err, DbError::Rule(CoreError::ShipmentCompleted(_)));
        let id = &parts[0].id;

        assert!(frozen(db.parts().unpack(id).await.unwrap_err()));
        assert!(frozen(db.parts().record_weight(id, 9.0).await.unwrap_err()));

        let ocr = OcrResult {
            text: "SN-1".to_string(),
            lines: vec!["SN-1".to_string()],
            confidence: 0.9,
        };
        assert!(frozen(db.parts().record_serial_number(id, &ocr).await.unwrap_err()));

        let patch = PartPatch {
            quantity: Some(7.0),
            ..Default::default()
        };
        assert!(frozen(db.parts().update(id, &patch).await.unwrap_err()));

        let stats = db.shipments().stats(&shipment.id).await.unwrap();
        let part = db.parts().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(part.weight_per_unit, parts[0].weight_per_unit);
        assert_eq!(part.quantity, parts[0].quantity);
        assert!(part.serial_number.is_none());
        assert!(stats.is_fully_packed());
    }

    #[tokio::test]
    async fn test_unknown_part_is_not_found() {
        let temp = TempDb::new();
        let (db, _, _) = setup(&temp).await;
        let err = db.parts().pack("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
