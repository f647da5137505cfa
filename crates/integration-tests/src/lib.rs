//! Integration tests for Delicious.
//!
//! # Running Tests
//!
//! ```bash
//! # Database tests: point at a disposable database, it is truncated
//! export TEST_DATABASE_URL=postgres://localhost/delicious_test
//! cargo test -p delicious-integration-tests -- --ignored
//!
//! # HTTP tests additionally need a running server
//! export DELICIOUS_TEST_URL=http://localhost:7777
//! ```
//!
//! # Test Categories
//!
//! - `stores_db` - Slugs, tags, rankings, paging, geo queries, ownership
//! - `accounts_db` - Registration, login and the password reset flow
//! - `site_http` - Redirects, escaping and API responses from a live server

use std::path::PathBuf;

use secrecy::SecretString;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};

use delicious_core::{Rating, StoreId};
use delicious_web::db::ReviewRepository;
use delicious_web::models::{CurrentUser, NewReview, Store};
use delicious_web::services::auth::AuthService;
use delicious_web::services::stores::{StoreForm, StoreService};
use delicious_web::services::uploads::PhotoUploader;

/// Password used for every test account.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Tests in one binary share a database, so each holds this while it runs.
static DATABASE_LOCK: Mutex<()> = Mutex::const_new(());

/// A migrated, emptied database reserved for the calling test.
pub struct TestDb {
    pub pool: PgPool,
    pub uploader: PhotoUploader,
    _guard: MutexGuard<'static, ()>,
}

impl TestDb {
    /// Connect to `TEST_DATABASE_URL`, migrate and truncate every table.
    ///
    /// # Panics
    ///
    /// Panics if the variable is unset or the database is unreachable.
    pub async fn new() -> Self {
        let guard = DATABASE_LOCK.lock().await;

        let url = std::env::var("TEST_DATABASE_URL")
            .map(SecretString::from)
            .expect("TEST_DATABASE_URL must point at a disposable database");
        let pool = delicious_web::db::create_pool(&url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("../web/migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        sqlx::query("TRUNCATE hearts, reviews, stores, users RESTART IDENTITY CASCADE")
            .execute(&pool)
            .await
            .expect("Failed to truncate tables");

        Self {
            pool,
            uploader: PhotoUploader::new(upload_dir()),
            _guard: guard,
        }
    }

    #[must_use]
    pub const fn stores(&self) -> StoreService<'_> {
        StoreService::new(&self.pool, &self.uploader)
    }

    /// Register a user named `name` with `{name}@example.com`.
    ///
    /// # Panics
    ///
    /// Panics if registration fails.
    pub async fn user(&self, name: &str) -> CurrentUser {
        let user = AuthService::new(&self.pool)
            .register_with_password(
                name,
                &format!("{}@example.com", name.to_lowercase()),
                TEST_PASSWORD,
                TEST_PASSWORD,
            )
            .await
            .expect("Failed to register test user");
        CurrentUser::from(&user)
    }

    /// Create a store through the same path as the add form.
    ///
    /// # Panics
    ///
    /// Panics if the store is rejected.
    pub async fn store(&self, form: &StoreForm, author: &CurrentUser) -> Store {
        self.stores()
            .create(form, None, author)
            .await
            .expect("Failed to create test store")
    }

    /// Leave a review with `rating` stars.
    ///
    /// # Panics
    ///
    /// Panics if the rating is out of range or the insert fails.
    pub async fn review(&self, store: StoreId, author: &CurrentUser, rating: i64) {
        ReviewRepository::new(&self.pool)
            .create(&NewReview {
                store_id: store,
                author_id: author.id,
                text: "Test review".to_owned(),
                rating: Rating::new(rating).expect("rating out of range"),
            })
            .await
            .expect("Failed to create review");
    }
}

/// A valid store form at `(lng, lat)`.
#[must_use]
pub fn store_form(name: &str, lng: f64, lat: f64, tags: &[&str]) -> StoreForm {
    StoreForm {
        name: name.to_owned(),
        description: format!("{name} description"),
        tags: tags.iter().map(|t| (*t).to_owned()).collect(),
        address: "1 Test Street".to_owned(),
        lng: lng.to_string(),
        lat: lat.to_string(),
        version: None,
    }
}

/// Base URL of a running server, for the HTTP tests.
#[must_use]
pub fn base_url() -> String {
    std::env::var("DELICIOUS_TEST_URL").unwrap_or_else(|_| "http://localhost:7777".to_string())
}

/// Directory used for photo uploads in tests.
#[must_use]
pub fn upload_dir() -> PathBuf {
    std::env::temp_dir().join("delicious-test-uploads")
}
