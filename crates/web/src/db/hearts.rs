//! Heart (favourite) repository.
//!
//! Hearts have set semantics: one row per `(user, store)` pair.

use std::collections::HashSet;

use sqlx::PgPool;

use delicious_core::{StoreId, UserId};

use super::RepositoryError;

/// Repository for heart database operations.
pub struct HeartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> HeartRepository<'a> {
    /// Create a new heart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Remove the heart if present, add it otherwise. Returns the user's
    /// hearts after the toggle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn toggle(&self, user: UserId, store: StoreId) -> Result<Vec<StoreId>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM hearts WHERE user_id = $1 AND store_id = $2")
            .bind(user)
            .bind(store)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            sqlx::query(
                r"
                INSERT INTO hearts (user_id, store_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(user)
            .bind(store)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::NotFound;
                }
                RepositoryError::Database(e)
            })?;
        }

        let hearts = sqlx::query_scalar(
            "SELECT store_id FROM hearts WHERE user_id = $1 ORDER BY created_at ASC, store_id ASC",
        )
        .bind(user)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(hearts)
    }

    /// The set of stores `user` has hearted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_user(&self, user: UserId) -> Result<HashSet<StoreId>, RepositoryError> {
        let ids: Vec<StoreId> = sqlx::query_scalar("SELECT store_id FROM hearts WHERE user_id = $1")
            .bind(user)
            .fetch_all(self.pool)
            .await?;

        Ok(ids.into_iter().collect())
    }
}
