//! # Part Commands
//!
//! The packing loop: find the part by its SAP index, weigh it, capture its
//! serial number, pack it.
//!
//! ```text
//! scan SAP ─► find_part ─► weigh_part ─► record_serial_number ─► pack_part
//!                            (scale)         (OCR result)
//! ```

use tracing::info;

use packing_core::{OcrResult, Part, PartPatch};

use crate::error::{ApiError, CommandResult};
use crate::state::AppState;

pub async fn list_parts(state: &AppState, shipment_id: &str) -> CommandResult<Vec<Part>> {
    let db = state.db().await?;
    Ok(db.parts().list_for_shipment(shipment_id).await?)
}

/// Looks a part up by SAP index within a shipment. Pending parts win over
/// packed ones with the same index.
pub async fn find_part(
    state: &AppState,
    shipment_id: &str,
    sap_index: &str,
) -> CommandResult<Option<Part>> {
    let db = state.db().await?;
    Ok(db.parts().find_by_sap_index(shipment_id, sap_index).await?)
}

pub async fn pack_part(state: &AppState, part_id: &str) -> CommandResult<Part> {
    let db = state.db().await?;
    Ok(db.parts().pack(part_id).await?)
}

pub async fn unpack_part(state: &AppState, part_id: &str) -> CommandResult<Part> {
    let db = state.db().await?;
    Ok(db.parts().unpack(part_id).await?)
}

/// Stores a weight typed in by the operator (kg per unit).
pub async fn record_part_weight(
    state: &AppState,
    part_id: &str,
    weight_per_unit: f64,
) -> CommandResult<Part> {
    let db = state.db().await?;
    Ok(db.parts().record_weight(part_id, weight_per_unit).await?)
}

/// Weighs the whole line on the scale and stores the per-unit weight.
///
/// Waits for a stable reading. Readings in grams are converted to kg; any
/// other unit is refused.
pub async fn weigh_part(state: &AppState, part_id: &str) -> CommandResult<Part> {
    let db = state.db().await?;
    let part = db
        .parts()
        .get_by_id(part_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Part", part_id))?;

    let reading = state.scale().await.get_stable().await?;
    let kilograms = match reading.unit.to_ascii_lowercase().as_str() {
        "kg" => reading.value,
        "g" => reading.value / 1000.0,
        _ => {
            return Err(ApiError::validation(format!(
                "Unsupported scale unit '{}'; set the scale to kg or g",
                reading.unit
            )))
        }
    };

    let per_unit = kilograms / part.quantity;
    let part = db.parts().record_weight(part_id, per_unit).await?;
    info!(
        part_id = %part_id,
        reading = reading.value,
        unit = %reading.unit,
        per_unit,
        "Part weighed"
    );
    Ok(part)
}

/// Stores the serial number recognised on the part's label.
pub async fn record_serial_number(
    state: &AppState,
    part_id: &str,
    ocr: OcrResult,
) -> CommandResult<Part> {
    let db = state.db().await?;
    Ok(db.parts().record_serial_number(part_id, &ocr).await?)
}

pub async fn update_part(state: &AppState, part_id: &str, patch: PartPatch) -> CommandResult<Part> {
    let db = state.db().await?;
    Ok(db.parts().update(part_id, &patch).await?)
}

// =============================================================================
// Unit Tests
// =============================================================================
