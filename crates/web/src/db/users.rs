//! User repository for database operations.
//!
//! Password hashes and reset tokens are only ever read or written through
//! the narrow methods here; [`User`] never carries them.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use delicious_core::{Email, UserId};

use super::RepositoryError;
use crate::models::{ResetTicket, User};

const USER_COLUMNS: &str = "id, name, email, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserWithHash {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Create a new user with a password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as(&sql)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::unique(e, "email"))?;

        Ok(user)
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1");
        let row: Option<UserWithHash> = sqlx::query_as(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(|r| (r.user, r.password_hash)))
    }

    /// Change a user's display name and email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Conflict` if the email belongs to another user.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_profile(
        &self,
        id: UserId,
        name: &str,
        email: &Email,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users SET name = $2, email = $3, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user: Option<User> = sqlx::query_as(&sql)
            .bind(id)
            .bind(name)
            .bind(email)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::unique(e, "email"))?;

        user.ok_or(RepositoryError::NotFound)
    }

    /// Store a reset token on the account with this email.
    ///
    /// Replaces any token the user already held. Returns `None` when no
    /// account has the email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_reset_token(
        &self,
        email: &Email,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            "UPDATE users SET reset_password_token = $2, reset_password_expires = $3, updated_at = now() \
             WHERE email = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as(&sql)
            .bind(email)
            .bind(token)
            .bind(expires_at)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Look up the holder of `token` if it has not expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetTicket>, RepositoryError> {
        let ticket = sqlx::query_as(
            r"
            SELECT id AS user_id, email, reset_password_expires AS expires_at
            FROM users
            WHERE reset_password_token = $1 AND reset_password_expires > $2
            ",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(ticket)
    }

    /// Set a new password and consume the reset token in one statement.
    ///
    /// Returns `None` if the token is unknown, expired, or was consumed by
    /// a concurrent request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reset_password(
        &self,
        token: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            "UPDATE users SET password_hash = $3, reset_password_token = NULL, \
             reset_password_expires = NULL, updated_at = now() \
             WHERE reset_password_token = $1 AND reset_password_expires > $2 \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as(&sql)
            .bind(token)
            .bind(now)
            .bind(password_hash)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }
}
