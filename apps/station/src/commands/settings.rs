//! Key/value station settings.

use std::collections::BTreeMap;

use crate::error::{ApiError, CommandResult};
use crate::state::AppState;

pub async fn get_settings(state: &AppState) -> CommandResult<BTreeMap<String, String>> {
    let db = state.db().await?;
    Ok(db.settings().all().await?)
}

pub async fn set_setting(state: &AppState, key: &str, value: &str) -> CommandResult<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ApiError::validation("Setting key is required"));
    }

    let db = state.db().await?;
    Ok(db.settings().set(key, value).await?)
}
