//! Photo evidence commands. The camera collaborator writes the file; these
//! commands register, list and remove it.

use std::path::Path;

use packing_core::Photo;
use packing_db::DbError;

use crate::error::{ApiError, CommandResult};
use crate::state::AppState;

/// Registers a photo file already written for `part_id`.
pub async fn add_photo(state: &AppState, part_id: &str, file_path: &Path) -> CommandResult<Photo> {
    let metadata = std::fs::metadata(file_path).map_err(|e| {
        ApiError::validation(format!("Photo file {}: {}", file_path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(ApiError::validation(format!(
            "Photo path {} is not a file",
            file_path.display()
        )));
    }

    let path = file_path
        .to_str()
        .ok_or_else(|| ApiError::validation("Photo path is not valid UTF-8"))?;
    let size = i64::try_from(metadata.len()).unwrap_or(i64::MAX);

    let db = state.db().await?;
    Ok(db.photos().add(part_id, path, size).await?)
}

pub async fn list_part_photos(state: &AppState, part_id: &str) -> CommandResult<Vec<Photo>> {
    let db = state.db().await?;
    Ok(db.photos().list_for_part(part_id).await?)
}

pub async fn list_shipment_photos(
    state: &AppState,
    shipment_id: &str,
) -> CommandResult<Vec<Photo>> {
    let db = state.db().await?;
    Ok(db.photos().list_for_shipment(shipment_id).await?)
}

/// Removes the photo file and its row.
pub async fn delete_photo(state: &AppState, photo_id: &str) -> CommandResult<()> {
    let db = state.db().await?;
    db.photos().delete(photo_id).await.map_err(|e| match e {
        DbError::NotFound { .. } => ApiError::not_found("Photo", photo_id),
        other => other.into(),
    })
}
