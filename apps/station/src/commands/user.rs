//! # User Commands
//!
//! Login and account administration. Administrative commands take the
//! acting user's id and refuse non-admins.

use tracing::warn;

use packing_core::{NewUser, User};
use packing_db::Database;

use crate::error::{ApiError, CommandResult, ErrorCode};
use crate::state::AppState;

async fn require_admin(db: &Database, acting_user_id: &str) -> CommandResult<()> {
    let user = db
        .users()
        .get_by_id(acting_user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", acting_user_id))?;

    if user.is_active && user.is_admin() {
        Ok(())
    } else {
        warn!(user = %user.login, "Administrative command refused");
        Err(ApiError::new(
            ErrorCode::InvalidCredentials,
            "Administrator rights required",
        ))
    }
}

/// Returns the user on success. Check `must_change_password` afterwards.
pub async fn login(state: &AppState, login: &str, password: &str) -> CommandResult<User> {
    let db = state.db().await?;
    Ok(db.users().authenticate(login, password).await?)
}

pub async fn change_password(
    state: &AppState,
    user_id: &str,
    old_password: &str,
    new_password: &str,
) -> CommandResult<()> {
    let db = state.db().await?;
    Ok(db
        .users()
        .change_password(user_id, old_password, new_password)
        .await?)
}

pub async fn list_users(state: &AppState, acting_user_id: &str) -> CommandResult<Vec<User>> {
    let db = state.db().await?;
    require_admin(&db, acting_user_id).await?;
    Ok(db.users().list().await?)
}

pub async fn create_user(
    state: &AppState,
    acting_user_id: &str,
    new: NewUser,
) -> CommandResult<User> {
    let db = state.db().await?;
    require_admin(&db, acting_user_id).await?;
    Ok(db.users().create(new).await?)
}

pub async fn reset_password(
    state: &AppState,
    acting_user_id: &str,
    user_id: &str,
    new_password: &str,
) -> CommandResult<()> {
    let db = state.db().await?;
    require_admin(&db, acting_user_id).await?;
    Ok(db.users().reset_password(user_id, new_password).await?)
}

pub async fn deactivate_user(
    state: &AppState,
    acting_user_id: &str,
    user_id: &str,
) -> CommandResult<()> {
    if acting_user_id == user_id {
        return Err(ApiError::validation("You cannot deactivate your own account"));
    }

    let db = state.db().await?;
    require_admin(&db, acting_user_id).await?;
    Ok(db.users().deactivate(user_id).await?)
}
