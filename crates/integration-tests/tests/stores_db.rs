//! Database tests for stores: slugs, tags, rankings, paging, geo queries,
//! ownership and hearts.
//!
//! These tests require a disposable `PostgreSQL` database in
//! `TEST_DATABASE_URL`; every table is truncated before each test.
//!
//! Run with: cargo test -p delicious-integration-tests -- --ignored

use delicious_core::{GeoPoint, NearQuery, PageOutcome, Pagination};
use delicious_integration_tests::{TestDb, store_form};
use delicious_web::db::{HeartRepository, RepositoryError, StoreRepository};
use delicious_web::error::AppError;
use delicious_web::services::stores::StoreService;
use delicious_web::services::uploads::{PhotoUpload, PhotoUploader};

fn png_upload(width: u32, height: u32) -> PhotoUpload {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut out = std::io::Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    PhotoUpload {
        content_type: Some("image/png".to_owned()),
        bytes: out.into_inner().into(),
    }
}

// ============================================================================
// Slugs
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_duplicate_names_get_numbered_slugs() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;

    let first = db.store(&store_form("Bean There", 0.0, 0.0, &[]), &wes).await;
    let second = db.store(&store_form("Bean There", 0.0, 0.0, &[]), &wes).await;
    let third = db.store(&store_form("bean there!", 0.0, 0.0, &[]), &wes).await;

    assert_eq!(first.slug.as_str(), "bean-there");
    assert_eq!(second.slug.as_str(), "bean-there-2");
    assert_eq!(third.slug.as_str(), "bean-there-3");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_slug_changes_only_when_name_changes() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;

    let store = db.store(&store_form("Corner Cafe", 0.0, 0.0, &[]), &wes).await;

    let mut form = store_form("Corner Cafe", 1.0, 1.0, &["Wifi"]);
    form.version = Some(store.version);
    let same_name = db.stores().update(store.id, &form, None, &wes).await.unwrap();
    assert_eq!(same_name.slug.as_str(), "corner-cafe");
    assert_eq!(same_name.version, store.version + 1);

    let mut form = store_form("Corner Bistro", 1.0, 1.0, &["Wifi"]);
    form.version = Some(same_name.version);
    let renamed = db.stores().update(store.id, &form, None, &wes).await.unwrap();
    assert_eq!(renamed.slug.as_str(), "corner-bistro");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_stale_edit_is_a_conflict() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;
    let store = db.store(&store_form("Corner Cafe", 0.0, 0.0, &[]), &wes).await;

    let mut form = store_form("Corner Cafe", 0.0, 0.0, &["Wifi"]);
    form.version = Some(store.version);
    db.stores().update(store.id, &form, None, &wes).await.unwrap();

    // Same version again: the form was rendered before the first edit.
    let err = db.stores().update(store.id, &form, None, &wes).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_rejected_edit_leaves_no_photo_behind() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;
    let store = db.store(&store_form("Corner Cafe", 0.0, 0.0, &[]), &wes).await;

    let uploads = tempfile::tempdir().unwrap();
    let uploader = PhotoUploader::new(uploads.path().to_path_buf());
    let service = StoreService::new(&db.pool, &uploader);

    let mut form = store_form("Corner Cafe", 0.0, 0.0, &[]);
    form.version = Some(store.version);
    service.update(store.id, &form, None, &wes).await.unwrap();

    let err = service
        .update(store.id, &form, Some(png_upload(1000, 500)), &wes)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
    assert_eq!(std::fs::read_dir(uploads.path()).unwrap().count(), 0);

    // With the current version the same photo is kept.
    form.version = Some(store.version + 1);
    let saved = service
        .update(store.id, &form, Some(png_upload(1000, 500)), &wes)
        .await
        .unwrap();
    let photo = saved.photo.unwrap();
    assert!(uploads.path().join(photo).exists());
}

// ============================================================================
// Ownership
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_only_the_author_can_edit() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;
    let debbie = db.user("Debbie").await;
    let store = db.store(&store_form("Bean There", 0.0, 0.0, &[]), &wes).await;

    assert!(db.stores().editable(store.id, &wes).await.is_ok());

    let err = db.stores().editable(store.id, &debbie).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{err:?}");

    let form = store_form("Taken Over", 0.0, 0.0, &[]);
    let err = db.stores().update(store.id, &form, None, &debbie).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{err:?}");

    let unchanged = StoreRepository::new(&db.pool)
        .get_by_id(store.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.name, "Bean There");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_invalid_form_writes_nothing() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;

    let mut form = store_form("Bean There", 0.0, 0.0, &[]);
    form.lat = "north".to_owned();
    let err = db.stores().create(&form, None, &wes).await.unwrap_err();

    assert!(matches!(err, AppError::Validation(_)), "{err:?}");
    assert_eq!(StoreRepository::new(&db.pool).count().await.unwrap(), 0);
}

// ============================================================================
// Tags
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_tag_counts_most_used_first() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;

    db.store(&store_form("One", 0.0, 0.0, &["b", "a"]), &wes).await;
    db.store(&store_form("Two", 0.0, 0.0, &["a"]), &wes).await;
    db.store(&store_form("Three", 0.0, 0.0, &[]), &wes).await;

    let repo = StoreRepository::new(&db.pool);
    let tags: Vec<(String, i64)> = repo
        .tag_list()
        .await
        .unwrap()
        .into_iter()
        .map(|t| (t.tag, t.count))
        .collect();
    assert_eq!(tags, vec![("a".to_owned(), 2), ("b".to_owned(), 1)]);

    assert_eq!(repo.list_by_tag(Some("a")).await.unwrap().len(), 2);
    assert_eq!(repo.list_by_tag(Some("b")).await.unwrap().len(), 1);
    // No tag: every store that has at least one.
    assert_eq!(repo.list_by_tag(None).await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_tag_ties_keep_first_appearance_then_text() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;

    db.store(&store_form("First", 0.0, 0.0, &["zeta"]), &wes).await;
    db.store(&store_form("Second", 0.0, 0.0, &["mid", "alpha"]), &wes).await;

    let tags: Vec<String> = StoreRepository::new(&db.pool)
        .tag_list()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.tag)
        .collect();
    assert_eq!(tags, vec!["zeta", "alpha", "mid"]);
}

// ============================================================================
// Top stores
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_top_stores_need_two_reviews() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;
    let debbie = db.user("Debbie").await;

    let great = db.store(&store_form("Great", 0.0, 0.0, &[]), &wes).await;
    let good = db.store(&store_form("Good", 0.0, 0.0, &[]), &wes).await;
    let single = db.store(&store_form("Single", 0.0, 0.0, &[]), &wes).await;

    db.review(great.id, &wes, 5).await;
    db.review(great.id, &debbie, 4).await;
    db.review(good.id, &wes, 3).await;
    db.review(good.id, &debbie, 4).await;
    db.review(single.id, &wes, 5).await;

    let top = db.stores().top_stores().await.unwrap();

    let names: Vec<&str> = top.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Great", "Good"]);
    assert_eq!(top[0].review_count, 2);
    assert!((top[0].average_rating - 4.5).abs() < 1e-9);
    assert!((top[1].average_rating - 3.5).abs() < 1e-9);
    assert_eq!(top[0].reviews.len(), 2);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_top_stores_capped_at_ten() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;
    let debbie = db.user("Debbie").await;

    for i in 0..12 {
        let store = db.store(&store_form(&format!("Store {i}"), 0.0, 0.0, &[]), &wes).await;
        db.review(store.id, &wes, 4).await;
        db.review(store.id, &debbie, 5).await;
    }

    assert_eq!(db.stores().top_stores().await.unwrap().len(), 10);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_top_store_ties_favour_more_reviews_then_older() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;
    let debbie = db.user("Debbie").await;
    let scott = db.user("Scott").await;

    let older = db.store(&store_form("Older pair", 0.0, 0.0, &[]), &wes).await;
    let newer = db.store(&store_form("Newer pair", 0.0, 0.0, &[]), &wes).await;
    let busy = db.store(&store_form("Busy", 0.0, 0.0, &[]), &wes).await;

    // Every store averages 4 stars.
    for store in [newer.id, older.id] {
        db.review(store, &wes, 4).await;
        db.review(store, &debbie, 4).await;
    }
    for author in [&wes, &debbie, &scott] {
        db.review(busy.id, author, 4).await;
    }

    let names: Vec<String> = db
        .stores()
        .top_stores()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Busy", "Older pair", "Newer pair"]);
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_listing_pages_and_past_the_end() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;

    for i in 0..6 {
        db.store(&store_form(&format!("Store {i}"), 0.0, 0.0, &[]), &wes).await;
    }

    let repo = StoreRepository::new(&db.pool);
    let count = repo.count().await.unwrap();
    assert_eq!(count, 6);

    let first = Pagination::stores(Some(1));
    let rows = repo.list_page(&first).await.unwrap();
    assert_eq!(rows.len(), 4);
    // Newest first.
    assert_eq!(rows[0].name, "Store 5");
    assert_eq!(
        first.resolve(rows.len(), count),
        PageOutcome::Render {
            page: 1,
            pages: 2,
            count: 6
        }
    );

    let second = Pagination::stores(Some(2));
    assert_eq!(repo.list_page(&second).await.unwrap().len(), 2);

    let past = Pagination::stores(Some(9));
    let rows = repo.list_page(&past).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(
        past.resolve(rows.len(), count),
        PageOutcome::RedirectTo {
            requested: 9,
            last: 2
        }
    );
}

// ============================================================================
// Geo
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_near_returns_stores_within_ten_km_nearest_first() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;

    // About 1.1 km per 0.01 degree of latitude.
    db.store(&store_form("Five km", -79.38, 43.65 + 0.045, &[]), &wes).await;
    db.store(&store_form("One km", -79.38, 43.65 + 0.009, &[]), &wes).await;
    db.store(&store_form("Twenty km", -79.38, 43.65 + 0.18, &[]), &wes).await;

    let origin = GeoPoint::new(-79.38, 43.65).unwrap();
    let stores = StoreRepository::new(&db.pool)
        .near(&NearQuery::around(origin))
        .await
        .unwrap();

    let names: Vec<&str> = stores.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["One km", "Five km"]);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_near_returns_at_most_ten() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;

    for i in 0..12 {
        let lat = 43.65 + f64::from(i) * 0.001;
        db.store(&store_form(&format!("Store {i}"), -79.38, lat, &[]), &wes).await;
    }

    let origin = GeoPoint::new(-79.38, 43.65).unwrap();
    let stores = StoreRepository::new(&db.pool)
        .near(&NearQuery::around(origin))
        .await
        .unwrap();

    assert_eq!(stores.len(), 10);
    assert_eq!(stores[0].name, "Store 0");
}

// ============================================================================
// Hearts
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_heart_toggles_membership() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;
    let a = db.store(&store_form("A", 0.0, 0.0, &[]), &wes).await;
    let b = db.store(&store_form("B", 0.0, 0.0, &[]), &wes).await;

    let hearts = HeartRepository::new(&db.pool);
    assert_eq!(hearts.toggle(wes.id, a.id).await.unwrap(), vec![a.id]);
    assert_eq!(hearts.toggle(wes.id, b.id).await.unwrap(), vec![a.id, b.id]);
    assert_eq!(hearts.toggle(wes.id, a.id).await.unwrap(), vec![b.id]);

    let hearted = StoreRepository::new(&db.pool).hearted_by(wes.id).await.unwrap();
    assert_eq!(hearted.len(), 1);
    assert_eq!(hearted[0].id, b.id);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_heart_on_missing_store_is_not_found() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;

    let err = HeartRepository::new(&db.pool)
        .toggle(wes.id, delicious_core::StoreId::new(9999))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound), "{err:?}");
}
