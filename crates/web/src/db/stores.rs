//! Store repository: listings, slugs, tags, search, geo and rankings.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use delicious_core::{
    EARTH_RADIUS_METERS, GeoPoint, Location, NearQuery, Pagination, Slug, StoreId, TagCount,
    UserId,
};

use super::RepositoryError;
use crate::models::{Store, StoreDraft, TopStore};

/// Columns decoded into [`StoreRow`], qualified with the `s` alias.
macro_rules! store_columns {
    () => {
        "s.id, s.name, s.slug, s.description, s.tags, s.created_at, \
         s.longitude, s.latitude, s.address, s.photo, s.author_id, s.version"
    };
}

/// Minimum reviews a store needs before it is ranked.
pub const TOP_STORES_MIN_REVIEWS: i64 = 2;

/// Stores shown on the top-stores page.
pub const TOP_STORES_LIMIT: i64 = 10;

/// `RepositoryError::Conflict` message for an update against an old version.
pub const STALE_VERSION: &str = "store was changed by someone else";

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    name: String,
    slug: Slug,
    description: String,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    longitude: f64,
    latitude: f64,
    address: String,
    photo: Option<String>,
    author_id: UserId,
    version: i32,
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let point = GeoPoint::new(row.longitude, row.latitude).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid location for store {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            tags: row.tags,
            created_at: row.created_at,
            location: Location {
                point,
                address: row.address,
            },
            photo: row.photo,
            author_id: row.author_id,
            version: row.version,
        })
    }
}

fn into_stores(rows: Vec<StoreRow>) -> Result<Vec<Store>, RepositoryError> {
    rows.into_iter().map(Store::try_from).collect()
}

/// Repository for store database operations.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a store by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored location is invalid.
    pub async fn get_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row: Option<StoreRow> =
            sqlx::query_as(concat!("SELECT ", store_columns!(), " FROM stores s WHERE s.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(Store::try_from).transpose()
    }

    /// Get a store by its slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored location is invalid.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Store>, RepositoryError> {
        let row: Option<StoreRow> = sqlx::query_as(concat!(
            "SELECT ",
            store_columns!(),
            " FROM stores s WHERE s.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        row.map(Store::try_from).transpose()
    }

    /// Existing slugs equal to `base` or one of its numbered variants,
    /// matched case-insensitively against [`Slug::collision_pattern`].
    ///
    /// `exclude` leaves out the store being renamed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn slugs_matching(
        &self,
        base: &Slug,
        exclude: Option<StoreId>,
    ) -> Result<Vec<String>, RepositoryError> {
        let slugs = sqlx::query_scalar(
            r"
            SELECT slug FROM stores
            WHERE slug ~* $1 AND ($2::int IS NULL OR id <> $2)
            ",
        )
        .bind(base.collision_pattern())
        .bind(exclude)
        .fetch_all(self.pool)
        .await?;

        Ok(slugs)
    }

    /// Insert a new store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug was taken in the meantime.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        draft: &StoreDraft,
        slug: &Slug,
        author: UserId,
    ) -> Result<Store, RepositoryError> {
        let row: StoreRow = sqlx::query_as(concat!(
            "INSERT INTO stores AS s (name, slug, description, tags, location_type, ",
            "longitude, latitude, address, photo, author_id) ",
            "VALUES ($1, $2, $3, $4, 'Point', $5, $6, $7, $8, $9) ",
            "RETURNING ",
            store_columns!()
        ))
        .bind(&draft.name)
        .bind(slug)
        .bind(&draft.description)
        .bind(&draft.tags)
        .bind(draft.location.point.longitude())
        .bind(draft.location.point.latitude())
        .bind(&draft.location.address)
        .bind(draft.photo.as_deref())
        .bind(author)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "slug"))?;

        Store::try_from(row)
    }

    /// Update a store if `expected_version` is still current.
    ///
    /// `slug` is `None` when the name did not change; `draft.photo` is
    /// `None` when no new photo was uploaded. Both keep their stored value.
    /// The location type is always reset to `Point`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store doesn't exist.
    /// Returns `RepositoryError::Conflict` if another write bumped the version first.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: StoreId,
        expected_version: i32,
        draft: &StoreDraft,
        slug: Option<&Slug>,
    ) -> Result<Store, RepositoryError> {
        let row: Option<StoreRow> = sqlx::query_as(concat!(
            "UPDATE stores AS s SET ",
            "name = $3, slug = COALESCE($4, s.slug), description = $5, tags = $6, ",
            "location_type = 'Point', longitude = $7, latitude = $8, address = $9, ",
            "photo = COALESCE($10, s.photo), version = s.version + 1 ",
            "WHERE s.id = $1 AND s.version = $2 ",
            "RETURNING ",
            store_columns!()
        ))
        .bind(id)
        .bind(expected_version)
        .bind(&draft.name)
        .bind(slug)
        .bind(&draft.description)
        .bind(&draft.tags)
        .bind(draft.location.point.longitude())
        .bind(draft.location.point.latitude())
        .bind(&draft.location.address)
        .bind(draft.photo.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "slug"))?;

        if let Some(row) = row {
            return Store::try_from(row);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stores WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool)
            .await?;

        if exists {
            Err(RepositoryError::Conflict(STALE_VERSION.to_owned()))
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    /// One page of stores, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_page(&self, pagination: &Pagination) -> Result<Vec<Store>, RepositoryError> {
        let offset = i64::try_from(pagination.skip()).unwrap_or(i64::MAX);

        let rows: Vec<StoreRow> = sqlx::query_as(concat!(
            "SELECT ",
            store_columns!(),
            " FROM stores s ORDER BY s.created_at DESC, s.id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(pagination.limit()))
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        into_stores(rows)
    }

    /// Total number of stores.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stores")
            .fetch_one(self.pool)
            .await?;

        u64::try_from(count)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative store count {count}")))
    }

    /// Every tag with the number of stores carrying it, most used first.
    ///
    /// Equal counts keep the order in which the tags first appeared (the
    /// lowest store id carrying them), then tag text.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tag_list(&self) -> Result<Vec<TagCount>, RepositoryError> {
        let tags = sqlx::query_as(
            r"
            SELECT t.tag, COUNT(*) AS count
            FROM stores s
            CROSS JOIN LATERAL unnest(s.tags) AS t(tag)
            GROUP BY t.tag
            ORDER BY count DESC, MIN(s.id) ASC, t.tag ASC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(tags)
    }

    /// Stores carrying `tag`, or every store with at least one tag when
    /// `tag` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_tag(&self, tag: Option<&str>) -> Result<Vec<Store>, RepositoryError> {
        let rows: Vec<StoreRow> = sqlx::query_as(concat!(
            "SELECT ",
            store_columns!(),
            " FROM stores s ",
            "WHERE CASE WHEN $1::text IS NULL THEN cardinality(s.tags) > 0 ",
            "ELSE $1 = ANY(s.tags) END ",
            "ORDER BY s.created_at DESC, s.id DESC"
        ))
        .bind(tag)
        .fetch_all(self.pool)
        .await?;

        into_stores(rows)
    }

    /// Full-text search over name and description, best match first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<Store>, RepositoryError> {
        let rows: Vec<StoreRow> = sqlx::query_as(concat!(
            "SELECT ",
            store_columns!(),
            " FROM stores s, websearch_to_tsquery('english', $1) AS q ",
            "WHERE s.search @@ q ",
            "ORDER BY ts_rank(s.search, q) DESC, s.id ASC ",
            "LIMIT $2"
        ))
        .bind(query)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        into_stores(rows)
    }

    /// Stores within `query.max_distance_meters` of `query.origin`,
    /// nearest first, at most `query.limit` of them.
    ///
    /// Distance is the haversine great-circle distance on the mean earth
    /// sphere, matching [`GeoPoint::distance_meters`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn near(&self, query: &NearQuery) -> Result<Vec<Store>, RepositoryError> {
        let rows: Vec<StoreRow> = sqlx::query_as(concat!(
            "SELECT * FROM (SELECT ",
            store_columns!(),
            ", 2.0 * $3::float8 * asin(least(1.0, sqrt(",
            "power(sin(radians(s.latitude - $2::float8) / 2.0), 2) + ",
            "cos(radians($2::float8)) * cos(radians(s.latitude)) * ",
            "power(sin(radians(s.longitude - $1::float8) / 2.0), 2)",
            "))) AS distance FROM stores s) AS nearby ",
            "WHERE nearby.distance <= $4::float8 ",
            "ORDER BY nearby.distance ASC, nearby.id ASC ",
            "LIMIT $5"
        ))
        .bind(query.origin.longitude())
        .bind(query.origin.latitude())
        .bind(EARTH_RADIUS_METERS)
        .bind(query.max_distance_meters)
        .bind(query.limit)
        .fetch_all(self.pool)
        .await?;

        into_stores(rows)
    }

    /// Best-rated stores with at least [`TOP_STORES_MIN_REVIEWS`] reviews.
    ///
    /// Reviews are not loaded here; see `ReviewRepository::list_for_stores`.
    /// Ties on the average go to the store with more reviews, then the
    /// older store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_stores(&self, limit: i64) -> Result<Vec<TopStore>, RepositoryError> {
        let stores = sqlx::query_as(
            r"
            SELECT s.id, s.name, s.slug, s.photo,
                   COUNT(r.id) AS review_count,
                   AVG(r.rating)::float8 AS average_rating
            FROM stores s
            JOIN reviews r ON r.store_id = s.id
            GROUP BY s.id
            HAVING COUNT(r.id) >= $1
            ORDER BY average_rating DESC, review_count DESC, s.created_at ASC, s.id ASC
            LIMIT $2
            ",
        )
        .bind(TOP_STORES_MIN_REVIEWS)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(stores)
    }

    /// Stores `user` has hearted, most recently hearted first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn hearted_by(&self, user: UserId) -> Result<Vec<Store>, RepositoryError> {
        let rows: Vec<StoreRow> = sqlx::query_as(concat!(
            "SELECT ",
            store_columns!(),
            " FROM stores s JOIN hearts h ON h.store_id = s.id ",
            "WHERE h.user_id = $1 ORDER BY h.created_at DESC"
        ))
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        into_stores(rows)
    }
}
