//! # User Repository
//!
//! Station accounts. Passwords are stored as Argon2 hashes
//! (see [`crate::credentials`]); plain text never reaches the database.
//!
//! Logins are unique among active users only, so a deactivated login can
//! be reused.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::credentials::{hash_password, verify_password};
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use packing_core::validation::{validate_login, validate_password, validate_person_name};
use packing_core::{NewUser, User};

const USER_COLUMNS: &str = r#"
    id, name, surname, login, password_hash, role, is_active,
    must_change_password, created_at, last_login
"#;

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(db: Database) -> Self {
        UserRepository { db }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(user)
    }

    /// Active user with the given login, if any.
    pub async fn find_active_by_login(&self, login: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE login = ?1 AND is_active = 1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(login.trim())
            .fetch_optional(self.db.pool())
            .await?;

        Ok(user)
    }

    /// All users, active first, then by surname and name.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY is_active DESC, surname, name"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(self.db.pool())
            .await?;

        Ok(users)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates a user after validating every field.
    pub async fn create(&self, new: NewUser) -> DbResult<User> {
        let login = new.login.trim().to_string();
        validate_login(&login)?;
        validate_password(&new.password)?;
        validate_person_name("name", &new.name)?;
        validate_person_name("surname", &new.surname)?;

        if self.find_active_by_login(&login).await?.is_some() {
            return Err(DbError::duplicate("login", login));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            surname: new.surname.trim().to_string(),
            login,
            password_hash: hash_password(&new.password)?,
            role: new.role,
            is_active: true,
            must_change_password: false,
            created_at: Utc::now(),
            last_login: None,
        };

        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, surname, login, password_hash, role,
                is_active, must_change_password, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 0, ?7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.surname)
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(self.db.pool())
        .await?;

        self.db.snapshot_if_due().await?;
        info!(id = %user.id, login = %user.login, role = user.role.as_str(), "User created");
        Ok(user)
    }

    /// Checks a login and password, recording the login time on success.
    ///
    /// Unknown login, inactive account and wrong password are all reported
    /// as [`DbError::InvalidCredentials`].
    pub async fn authenticate(&self, login: &str, password: &str) -> DbResult<User> {
        let Some(mut user) = self.find_active_by_login(login).await? else {
            warn!(login = %login.trim(), "Login failed");
            return Err(DbError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash) {
            warn!(login = %user.login, "Login failed");
            return Err(DbError::InvalidCredentials);
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login = ?1 WHERE id = ?2")
            .bind(now)
            .bind(&user.id)
            .execute(self.db.pool())
            .await?;
        user.last_login = Some(now);

        self.db.snapshot_if_due().await?;
        info!(login = %user.login, "User logged in");
        Ok(user)
    }

    /// Replaces the password when `old_password` matches.
    pub async fn change_password(
        &self,
        id: &str,
        old_password: &str,
        new_password: &str,
    ) -> DbResult<()> {
        let user = self.require(id).await?;
        if !verify_password(old_password, &user.password_hash) {
            return Err(DbError::InvalidCredentials);
        }
        validate_password(new_password)?;

        self.store_password(id, new_password, false).await?;
        info!(id = %id, "Password changed");
        Ok(())
    }

    /// Administrative reset. The user must choose a new password at next login.
    pub async fn reset_password(&self, id: &str, new_password: &str) -> DbResult<()> {
        self.require(id).await?;
        validate_password(new_password)?;

        self.store_password(id, new_password, true).await?;
        info!(id = %id, "Password reset");
        Ok(())
    }

    /// Soft-deletes a user. History referencing the account is kept.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        self.db.snapshot_if_due().await?;
        info!(id = %id, "User deactivated");
        Ok(())
    }

    async fn require(&self, id: &str) -> DbResult<User> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    async fn store_password(&self, id: &str, password: &str, must_change: bool) -> DbResult<()> {
        let hash = hash_password(password)?;
        sqlx::query("UPDATE users SET password_hash = ?1, must_change_password = ?2 WHERE id = ?3")
            .bind(hash)
            .bind(must_change)
            .bind(id)
            .execute(self.db.pool())
            .await?;

        self.db.snapshot_if_due().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
