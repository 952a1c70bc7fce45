//! # Shipment Commands
//!
//! Creating, editing and closing shipments.
//!
//! ## Protected Shipments
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update / delete / change password                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  shipment.password_hash set? ── no ──► proceed                          │
//! │       │ yes                                                             │
//! │       ▼                                                                 │
//! │  verify(password) ── fail ──► INVALID_CREDENTIALS                       │
//! │       │ ok                                                              │
//! │       ▼                                                                 │
//! │  proceed                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Packing itself is never password-gated.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

use packing_core::{
    ImportedPart, NewShipment, Shipment, ShipmentFilter, ShipmentPatch, ShipmentStats,
    ShipmentStatus,
};
use packing_db::{Database, DbError};

use crate::error::{ApiError, CommandResult};
use crate::state::AppState;

/// A shipment with its progress, as shown in lists and headers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentOverview {
    pub shipment: Shipment,
    /// Whether edits need the shipment password.
    pub is_protected: bool,
    pub stats: ShipmentStats,
}

async fn overview(db: &Database, shipment: Shipment) -> CommandResult<ShipmentOverview> {
    let stats = db.shipments().stats(&shipment.id).await?;
    Ok(ShipmentOverview {
        is_protected: shipment.is_protected(),
        shipment,
        stats,
    })
}

/// Fails with `INVALID_CREDENTIALS` unless the shipment is unprotected or
/// `password` matches.
async fn unlock(db: &Database, id: &str, password: Option<&str>) -> CommandResult<()> {
    let unlocked = db
        .shipments()
        .verify_password(id, password.unwrap_or_default())
        .await?;
    if unlocked {
        Ok(())
    } else {
        Err(DbError::InvalidCredentials.into())
    }
}

/// The configured shipments root: the `shipments_root` setting when set,
/// else `[storage] shipments_root`.
pub(crate) async fn shipments_root(state: &AppState, db: &Database) -> CommandResult<PathBuf> {
    let setting = db.settings().get("shipments_root").await?;
    Ok(match setting {
        Some(root) if !root.trim().is_empty() => PathBuf::from(root.trim()),
        _ => state.config().shipments_root(),
    })
}

// =============================================================================
// Commands
// =============================================================================

pub async fn list_shipments(
    state: &AppState,
    filter: ShipmentFilter,
) -> CommandResult<Vec<ShipmentOverview>> {
    let db = state.db().await?;
    let shipments = db.shipments().list(&filter).await?;

    let mut overviews = Vec::with_capacity(shipments.len());
    for shipment in shipments {
        overviews.push(overview(&db, shipment).await?);
    }

    debug!(count = overviews.len(), "Listed shipments");
    Ok(overviews)
}

pub async fn get_shipment(state: &AppState, id: &str) -> CommandResult<ShipmentOverview> {
    let db = state.db().await?;
    let shipment = db.shipments().require(id).await?;
    overview(&db, shipment).await
}

/// Creates a shipment from an imported part list.
pub async fn create_shipment(
    state: &AppState,
    new: NewShipment,
    parts: Vec<ImportedPart>,
) -> CommandResult<ShipmentOverview> {
    if parts.is_empty() {
        return Err(ApiError::validation("A shipment needs at least one part"));
    }

    let db = state.db().await?;
    let shipment = db.shipments().create(new, &parts).await?;
    info!(
        id = %shipment.id,
        number = %shipment.shipment_number,
        parts = parts.len(),
        "Shipment imported"
    );
    overview(&db, shipment).await
}

pub async fn update_shipment(
    state: &AppState,
    id: &str,
    patch: ShipmentPatch,
    password: Option<String>,
) -> CommandResult<ShipmentOverview> {
    let db = state.db().await?;
    unlock(&db, id, password.as_deref()).await?;

    let shipment = db.shipments().update(id, &patch).await?;
    overview(&db, shipment).await
}

/// Moves the shipment through its lifecycle. Completing requires every part
/// to be packed.
pub async fn set_shipment_status(
    state: &AppState,
    id: &str,
    status: ShipmentStatus,
) -> CommandResult<ShipmentOverview> {
    let db = state.db().await?;
    let shipment = db.shipments().set_status(id, status).await?;
    overview(&db, shipment).await
}

pub async fn set_shipment_archived(
    state: &AppState,
    id: &str,
    archived: bool,
) -> CommandResult<()> {
    let db = state.db().await?;
    if archived {
        db.shipments().archive(id).await?;
    } else {
        db.shipments().unarchive(id).await?;
    }
    Ok(())
}

/// Sets, changes or (with `new_password: None`) removes the shipment password.
pub async fn set_shipment_password(
    state: &AppState,
    id: &str,
    current_password: Option<String>,
    new_password: Option<String>,
) -> CommandResult<()> {
    let db = state.db().await?;
    unlock(&db, id, current_password.as_deref()).await?;

    db.shipments()
        .set_password(id, new_password.as_deref())
        .await?;
    Ok(())
}

pub async fn verify_shipment_password(
    state: &AppState,
    id: &str,
    password: &str,
) -> CommandResult<bool> {
    let db = state.db().await?;
    Ok(db.shipments().verify_password(id, password).await?)
}

/// Deletes the shipment with its parts and photo files.
pub async fn delete_shipment(
    state: &AppState,
    id: &str,
    password: Option<String>,
) -> CommandResult<()> {
    let db = state.db().await?;
    unlock(&db, id, password.as_deref()).await?;

    db.shipments().delete(id).await?;
    Ok(())
}

/// Resolves the shipment's output folder and creates it.
pub async fn prepare_shipment_folder(state: &AppState, id: &str) -> CommandResult<PathBuf> {
    let db = state.db().await?;
    let root = shipments_root(state, &db).await?;
    let folder = db.shipments().output_folder(id, &root).await?;

    std::fs::create_dir_all(&folder).map_err(DbError::from)?;
    debug!(id = %id, folder = ?folder, "Shipment folder ready");
    Ok(folder)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::state::test_support::TestStation;

    pub(crate) fn new_shipment(number: &str) -> NewShipment {
        NewShipment {
            shipment_number: number.to_string(),
            destination: "Rotterdam".to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn part(sap: &str, quantity: f64, row: i64) -> ImportedPart {
        ImportedPart {
            sap_index: sap.to_string(),
            description: format!("Part {sap}"),
            quantity,
            unit: "pcs".to_string(),
            country: None,
            order_number: None,
            order_description: None,
            row_number: row,
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let station = TestStation::start().await;
        let state = &station.state;

        let created = create_shipment(state, new_shipment("R-1"), vec![part("100", 2.0, 1)])
            .await
            .unwrap();
        assert_eq!(created.stats.total_parts, 1);
        assert!(!created.is_protected);

        let listed = list_shipments(state, ShipmentFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].shipment.id, created.shipment.id);
    }

    #[tokio::test]
    async fn test_create_requires_parts() {
        let station = TestStation::start().await;

        let err = create_shipment(&station.state, new_shipment("R-2"), vec![])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_protected_shipment_needs_password() {
        let station = TestStation::start().await;
        let state = &station.state;
        let id = create_shipment(state, new_shipment("R-3"), vec![part("1", 1.0, 1)])
            .await
            .unwrap()
            .shipment
            .id;

        set_shipment_password(state, &id, None, Some("lock".into()))
            .await
            .unwrap();
        assert!(get_shipment(state, &id).await.unwrap().is_protected);

        let patch = ShipmentPatch {
            notes: Some("fragile".into()),
            ..Default::default()
        };
        let err = update_shipment(state, &id, patch.clone(), None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);

        let updated = update_shipment(state, &id, patch, Some("lock".into()))
            .await
            .unwrap();
        assert_eq!(updated.shipment.notes.as_deref(), Some("fragile"));

        let err = delete_shipment(state, &id, Some("wrong".into())).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCredentials);
        delete_shipment(state, &id, Some("lock".into())).await.unwrap();

        let err = get_shipment(state, &id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_complete_with_pending_parts_is_rejected() {
        let station = TestStation::start().await;
        let state = &station.state;
        let id = create_shipment(state, new_shipment("R-4"), vec![part("1", 1.0, 1)])
            .await
            .unwrap()
            .shipment
            .id;

        let err = set_shipment_status(state, &id, ShipmentStatus::Completed)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessLogic);
    }

    #[tokio::test]
    async fn test_archive_hides_from_default_list() {
        let station = TestStation::start().await;
        let state = &station.state;
        let id = create_shipment(state, new_shipment("R-5"), vec![part("1", 1.0, 1)])
            .await
            .unwrap()
            .shipment
            .id;

        set_shipment_archived(state, &id, true).await.unwrap();
        assert!(list_shipments(state, ShipmentFilter::default())
            .await
            .unwrap()
            .is_empty());

        let all = ShipmentFilter {
            include_archived: true,
            ..Default::default()
        };
        assert_eq!(list_shipments(state, all).await.unwrap().len(), 1);

        set_shipment_archived(state, &id, false).await.unwrap();
        assert_eq!(
            list_shipments(state, ShipmentFilter::default()).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_prepare_folder_under_configured_root() {
        let station = TestStation::start().await;
        let state = &station.state;
        let id = create_shipment(state, new_shipment("R-6"), vec![part("1", 1.0, 1)])
            .await
            .unwrap()
            .shipment
            .id;

        let folder = prepare_shipment_folder(state, &id).await.unwrap();
        assert!(folder.starts_with(station.dir().join("shipments")));
        assert!(folder.is_dir());

        let custom = station.dir().join("elsewhere");
        state
            .db()
            .await
            .unwrap()
            .settings()
            .set("shipments_root", custom.to_str().unwrap())
            .await
            .unwrap();
        let folder = prepare_shipment_folder(state, &id).await.unwrap();
        assert!(folder.starts_with(&custom));
    }
}
