//! Store service: form validation, ownership, slugs and rankings.
//!
//! Slug generation and review loading are explicit steps here rather than
//! hooks on the repository, so every extra query a save or page costs is
//! visible in one place.

use std::collections::HashMap;

use sqlx::PgPool;

use delicious_core::{GeoPoint, Location, Slug, StoreId, normalize_tags};

use crate::db::stores::{STALE_VERSION, TOP_STORES_LIMIT};
use crate::db::{RepositoryError, ReviewRepository, StoreRepository};
use crate::error::AppError;
use crate::models::{CurrentUser, Review, Store, StoreDraft, TopStore};
use crate::services::uploads::{PhotoUpload, PhotoUploader};

/// Raw store form fields as submitted.
#[derive(Debug, Clone, Default)]
pub struct StoreForm {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub address: String,
    pub lng: String,
    pub lat: String,
    /// Version the edit form was rendered from.
    pub version: Option<i32>,
}

impl StoreForm {
    /// Check required fields and build a draft without a photo.
    ///
    /// # Errors
    ///
    /// Returns every validation message that applies, in form order.
    pub fn validate(&self) -> Result<StoreDraft, Vec<String>> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push("Please enter a store name!".to_owned());
        } else if Slug::from_name(name).is_err() {
            errors.push("Store names need at least one letter or number!".to_owned());
        }

        let address = self.address.trim();
        if address.is_empty() {
            errors.push("You must supply an address!".to_owned());
        }

        let point = GeoPoint::parse(Some(&self.lng), Some(&self.lat));
        if point.is_err() {
            errors.push("You must supply coordinates!".to_owned());
        }

        match point {
            Ok(point) if errors.is_empty() => Ok(StoreDraft {
                name: name.to_owned(),
                description: self.description.trim().to_owned(),
                tags: normalize_tags(&self.tags),
                location: Location {
                    point,
                    address: address.to_owned(),
                },
                photo: None,
            }),
            _ => Err(errors),
        }
    }
}

/// Fail unless `user` wrote `store`.
///
/// # Errors
///
/// Returns `AppError::Forbidden` when the store has another author.
pub fn confirm_owner(store: &Store, user: &CurrentUser) -> Result<(), AppError> {
    if store.author_id == user.id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You must own a store in order to edit it!".to_owned(),
        ))
    }
}

/// Store operations that span repositories or the upload pipeline.
pub struct StoreService<'a> {
    stores: StoreRepository<'a>,
    reviews: ReviewRepository<'a>,
    uploader: &'a PhotoUploader,
}

impl<'a> StoreService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, uploader: &'a PhotoUploader) -> Self {
        Self {
            stores: StoreRepository::new(pool),
            reviews: ReviewRepository::new(pool),
            uploader,
        }
    }

    /// Validate, store the photo, pick a slug and insert.
    ///
    /// Nothing is written when validation fails.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for bad form input, `AppError::Upload`
    /// for a rejected photo, or a database error.
    pub async fn create(
        &self,
        form: &StoreForm,
        photo: Option<PhotoUpload>,
        author: &CurrentUser,
    ) -> Result<Store, AppError> {
        let mut draft = form.validate().map_err(AppError::Validation)?;
        draft.photo = self.uploader.save(photo).await?;

        let result = self.insert(&draft, author).await;
        self.discard_photo_on_error(&draft, result).await
    }

    async fn insert(&self, draft: &StoreDraft, author: &CurrentUser) -> Result<Store, AppError> {
        let slug = self.unique_slug(&draft.name, None).await?;
        let store = self
            .stores
            .create(draft, &slug, author.id)
            .await
            .map_err(slug_race)?;

        tracing::info!(store_id = %store.id, slug = %store.slug, "Store created");
        Ok(store)
    }

    /// Load a store for editing by its owner.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Forbidden`.
    pub async fn editable(&self, id: StoreId, user: &CurrentUser) -> Result<Store, AppError> {
        let store = self
            .stores
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("store {id}")))?;
        confirm_owner(&store, user)?;
        Ok(store)
    }

    /// Apply an edit. The owner check runs before anything is written; the
    /// slug is regenerated only when the name changed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound`, `AppError::Forbidden`,
    /// `AppError::Validation`, `AppError::Upload`, or `AppError::Conflict`
    /// when the form was rendered from an older version.
    pub async fn update(
        &self,
        id: StoreId,
        form: &StoreForm,
        photo: Option<PhotoUpload>,
        user: &CurrentUser,
    ) -> Result<Store, AppError> {
        let current = self.editable(id, user).await?;

        let mut draft = form.validate().map_err(AppError::Validation)?;
        draft.photo = self.uploader.save(photo).await?;

        let expected_version = form.version.unwrap_or(current.version);
        let result = self.apply(&current, expected_version, &draft).await;
        self.discard_photo_on_error(&draft, result).await
    }

    async fn apply(
        &self,
        current: &Store,
        expected_version: i32,
        draft: &StoreDraft,
    ) -> Result<Store, AppError> {
        let id = current.id;
        let slug = if draft.name == current.name {
            None
        } else {
            Some(self.unique_slug(&draft.name, Some(id)).await?)
        };

        let store = self
            .stores
            .update(id, expected_version, draft, slug.as_ref())
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AppError::NotFound(format!("store {id}")),
                RepositoryError::Conflict(msg) if msg == STALE_VERSION => {
                    AppError::Conflict("This store was changed by someone else".to_owned())
                }
                other => slug_race(other),
            })?;

        tracing::info!(store_id = %store.id, version = store.version, "Store updated");
        Ok(store)
    }

    /// A failed save must not leave its photo behind in the upload directory.
    async fn discard_photo_on_error(
        &self,
        draft: &StoreDraft,
        result: Result<Store, AppError>,
    ) -> Result<Store, AppError> {
        if let (Err(_), Some(filename)) = (&result, &draft.photo) {
            self.uploader.discard(filename).await;
        }
        result
    }

    /// Base slug for `name`, numbered past any existing variants.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the name has nothing to slug.
    pub async fn unique_slug(&self, name: &str, exclude: Option<StoreId>) -> Result<Slug, AppError> {
        let base = Slug::from_name(name).map_err(|e| AppError::Validation(vec![e.to_string()]))?;
        let existing = self.stores.slugs_matching(&base, exclude).await?;
        Ok(base.disambiguate(&existing))
    }

    /// A store and its reviews, by slug.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown slug.
    pub async fn show(&self, slug: &str) -> Result<(Store, Vec<Review>), AppError> {
        let not_found = || AppError::NotFound(format!("store {slug}"));
        let slug = Slug::parse(slug).map_err(|_| not_found())?;

        let store = self.stores.get_by_slug(&slug).await?.ok_or_else(not_found)?;
        let reviews = self.reviews.list_for_store(store.id).await?;
        Ok((store, reviews))
    }

    /// The top-stores ranking with each store's reviews attached.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn top_stores(&self) -> Result<Vec<TopStore>, AppError> {
        let mut top = self.stores.top_stores(TOP_STORES_LIMIT).await?;
        let ids: Vec<StoreId> = top.iter().map(|s| s.id).collect();
        attach_reviews(&mut top, self.reviews.list_for_stores(&ids).await?);
        Ok(top)
    }
}

/// Two saves can race to the same slug; the unique index turns the loser
/// into a conflict.
fn slug_race(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::Conflict(_) => {
            AppError::Conflict("Another store just took that name, please try again".to_owned())
        }
        other => AppError::Database(other),
    }
}

fn attach_reviews(top: &mut [TopStore], reviews: Vec<Review>) {
    let mut by_store: HashMap<StoreId, Vec<Review>> = HashMap::new();
    for review in reviews {
        by_store.entry(review.store_id).or_default().push(review);
    }
    for store in top {
        store.reviews = by_store.remove(&store.id).unwrap_or_default();
    }
}
