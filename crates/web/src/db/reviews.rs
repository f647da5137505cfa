//! Review repository.

use sqlx::PgPool;

use delicious_core::StoreId;

use super::RepositoryError;
use crate::models::{NewReview, Review};

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.store_id, r.author_id, u.name AS author_name,
           r.text, r.rating, r.created_at
    FROM reviews r
    JOIN users u ON u.id = r.author_id
";

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, review: &NewReview) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO reviews (store_id, author_id, text, rating)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(review.store_id)
        .bind(review.author_id)
        .bind(&review.text)
        .bind(review.rating)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        Ok(())
    }

    /// Reviews of one store, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_store(&self, store: StoreId) -> Result<Vec<Review>, RepositoryError> {
        let sql = format!("{REVIEW_SELECT} WHERE r.store_id = $1 ORDER BY r.created_at DESC, r.id DESC");
        let reviews = sqlx::query_as(&sql)
            .bind(store)
            .fetch_all(self.pool)
            .await?;

        Ok(reviews)
    }

    /// Reviews of several stores in one query, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_stores(&self, stores: &[StoreId]) -> Result<Vec<Review>, RepositoryError> {
        if stores.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{REVIEW_SELECT} WHERE r.store_id = ANY($1) ORDER BY r.created_at DESC, r.id DESC"
        );
        let reviews = sqlx::query_as(&sql)
            .bind(stores)
            .fetch_all(self.pool)
            .await?;

        Ok(reviews)
    }
}
