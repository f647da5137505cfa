//! Store domain types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use delicious_core::{Location, Slug, StoreId, UserId};

use super::Review;

/// Shown when a store has no photo.
pub const PLACEHOLDER_PHOTO: &str = "/static/images/store.svg";

/// URL path a stored photo filename is served from.
#[must_use]
pub fn photo_path(photo: Option<&str>) -> String {
    photo.map_or_else(|| PLACEHOLDER_PHOTO.to_owned(), |p| format!("/uploads/{p}"))
}

/// A store listing (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub location: Location,
    /// Filename under the upload directory.
    pub photo: Option<String>,
    pub author_id: UserId,
    /// Optimistic concurrency token, bumped on every update.
    #[serde(skip)]
    pub version: i32,
}

impl Store {
    #[must_use]
    pub fn photo_url(&self) -> String {
        photo_path(self.photo.as_deref())
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("/store/{}", self.slug)
    }

    /// First 25 words of the description.
    #[must_use]
    pub fn teaser(&self) -> String {
        let words: Vec<&str> = self.description.split_whitespace().collect();
        if words.len() > 25 {
            format!("{}…", words.iter().take(25).copied().collect::<Vec<_>>().join(" "))
        } else {
            words.join(" ")
        }
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.location.point.longitude()
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.location.point.latitude()
    }
}

/// Validated store fields ready to be written.
///
/// `photo` is `None` when no new photo was uploaded; updates then keep the
/// existing one.
#[derive(Debug, Clone)]
pub struct StoreDraft {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub location: Location,
    pub photo: Option<String>,
}

/// The public projection used by the JSON search and map endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub slug: Slug,
    pub name: String,
    pub description: String,
    pub location: Location,
    pub photo: Option<String>,
}

impl From<Store> for StoreSummary {
    fn from(store: Store) -> Self {
        Self {
            slug: store.slug,
            name: store.name,
            description: store.description,
            location: store.location,
            photo: store.photo,
        }
    }
}

/// A store on a listing page, with whether the viewer has hearted it.
#[derive(Debug, Clone)]
pub struct StoreCard {
    pub store: Store,
    pub hearted: bool,
}

impl StoreCard {
    /// Pair each store with the viewer's hearts.
    #[must_use]
    pub fn from_stores(stores: Vec<Store>, hearts: &HashSet<StoreId>) -> Vec<Self> {
        stores
            .into_iter()
            .map(|store| {
                let hearted = hearts.contains(&store.id);
                Self { store, hearted }
            })
            .collect()
    }
}

/// One row of the top-stores ranking.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopStore {
    pub id: StoreId,
    pub name: String,
    pub slug: Slug,
    pub photo: Option<String>,
    pub review_count: i64,
    pub average_rating: f64,
    /// Loaded by a follow-up query, not part of the aggregate row.
    #[sqlx(skip)]
    pub reviews: Vec<Review>,
}

impl TopStore {
    #[must_use]
    pub fn photo_url(&self) -> String {
        photo_path(self.photo.as_deref())
    }

    /// Average with one decimal, e.g. `4.5`.
    #[must_use]
    pub fn average_display(&self) -> String {
        format!("{:.1}", self.average_rating)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use delicious_core::GeoPoint;

    fn store(id: i32, description: &str, photo: Option<&str>) -> Store {
        Store {
            id: StoreId::new(id),
            name: "Coffee".to_owned(),
            slug: Slug::parse("coffee").unwrap(),
            description: description.to_owned(),
            tags: vec!["Wifi".to_owned()],
            created_at: Utc::now(),
            location: Location {
                point: GeoPoint::new(-79.4, 43.6).unwrap(),
                address: "1 King St".to_owned(),
            },
            photo: photo.map(str::to_owned),
            author_id: UserId::new(1),
            version: 1,
        }
    }

    #[test]
    fn test_photo_url() {
        assert_eq!(store(1, "", None).photo_url(), PLACEHOLDER_PHOTO);
        assert_eq!(
            store(1, "", Some("abc.jpeg")).photo_url(),
            "/uploads/abc.jpeg"
        );
    }

    #[test]
    fn test_teaser_truncates_long_descriptions() {
        let long = "word ".repeat(30);
        let teaser = store(1, &long, None).teaser();
        assert_eq!(teaser.split_whitespace().count(), 25);
        assert!(teaser.ends_with('…'));
        assert_eq!(store(1, " short  text ", None).teaser(), "short text");
    }

    #[test]
    fn test_store_cards_mark_hearts() {
        let hearts: HashSet<StoreId> = [StoreId::new(2)].into_iter().collect();
        let cards = StoreCard::from_stores(vec![store(1, "", None), store(2, "", None)], &hearts);
        assert!(!cards[0].hearted);
        assert!(cards[1].hearted);
    }

    #[test]
    fn test_store_json_hides_version() {
        let json = serde_json::to_value(store(1, "", None)).unwrap();
        assert!(json.get("version").is_none());
        assert_eq!(json["location"]["type"], "Point");
        assert_eq!(json["slug"], "coffee");
    }
}
