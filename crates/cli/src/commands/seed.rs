//! Load sample users, stores, reviews and hearts from a YAML file.
//!
//! Stores go through the same validation and slug generation as the web
//! form, so seeded data looks exactly like data entered on the site.
//!
//! ```yaml
//! users:
//!   - name: Wes
//!     email: wes@example.com
//!     password: correct-horse-battery
//!     hearts: [Bean There]
//! stores:
//!   - name: Bean There
//!     description: Espresso and pastries
//!     tags: [Wifi, Open Late]
//!     address: 1 King St W, Toronto
//!     lng: -79.3776
//!     lat: 43.6489
//!     author: wes@example.com
//! reviews:
//!   - store: Bean There
//!     author: wes@example.com
//!     text: Great flat white
//!     rating: 5
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use delicious_core::{Email, Rating, StoreId};
use delicious_web::db::{HeartRepository, ReviewRepository, UserRepository};
use delicious_web::models::{CurrentUser, NewReview, User};
use delicious_web::services::auth::{AuthError, AuthService};
use delicious_web::services::stores::{StoreForm, StoreService};
use delicious_web::services::uploads::PhotoUploader;

use super::connect;

/// Top level of a seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub users: Vec<SeedUser>,
    pub stores: Vec<SeedStore>,
    pub reviews: Vec<SeedReview>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Names of stores this user has hearted.
    #[serde(default)]
    pub hearts: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedStore {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub address: String,
    pub lng: f64,
    pub lat: f64,
    /// Email of one of the seeded users.
    pub author: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedReview {
    /// Name of one of the seeded stores; the first store with that name.
    pub store: String,
    /// Email of one of the seeded users.
    pub author: String,
    pub text: String,
    pub rating: i64,
}

impl SeedFile {
    /// Cross-reference checks that can run before touching the database.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let emails: Vec<String> = self
            .users
            .iter()
            .filter_map(|u| match Email::parse(&u.email) {
                Ok(email) => Some(email.as_str().to_owned()),
                Err(e) => {
                    errors.push(format!("user {}: {e}", u.name));
                    None
                }
            })
            .collect();
        let known_user = |email: &str| {
            Email::parse(email).is_ok_and(|e| emails.iter().any(|known| known == e.as_str()))
        };
        let known_store = |name: &str| self.stores.iter().any(|s| s.name == name);

        for user in &self.users {
            for heart in user.hearts.iter().filter(|h| !known_store(h.as_str())) {
                errors.push(format!("user {}: hearts unknown store {heart}", user.email));
            }
        }

        for store in &self.stores {
            if !known_user(store.author.as_str()) {
                errors.push(format!("store {}: unknown author {}", store.name, store.author));
            }
            if let Err(messages) = store.form().validate() {
                for message in messages {
                    errors.push(format!("store {}: {message}", store.name));
                }
            }
        }

        for review in &self.reviews {
            if !known_store(review.store.as_str()) {
                errors.push(format!("review: unknown store {}", review.store));
            }
            if !known_user(review.author.as_str()) {
                errors.push(format!("review of {}: unknown author {}", review.store, review.author));
            }
            if let Err(e) = Rating::new(review.rating) {
                errors.push(format!("review of {}: {e}", review.store));
            }
            if review.text.trim().is_empty() {
                errors.push(format!("review of {}: text is empty", review.store));
            }
        }

        errors
    }
}

impl SeedStore {
    fn form(&self) -> StoreForm {
        StoreForm {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            address: self.address.clone(),
            lng: self.lng.to_string(),
            lat: self.lat.to_string(),
            version: None,
        }
    }
}

/// Seed the database from `file_path`.
///
/// With `wipe`, every user, store, review and heart is deleted first.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, or if
/// a database operation fails.
pub async fn run(file_path: &str, wipe: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed data from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = seed.validate();
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = connect().await?;
    if wipe {
        wipe_all(&pool).await?;
    }

    let users = seed_users(&pool, &seed.users).await?;
    let stores = seed_stores(&pool, &seed.stores, &users).await?;

    let reviews = ReviewRepository::new(&pool);
    for review in &seed.reviews {
        let (Some(author), Some(store)) = (lookup(&users, &review.author), stores.get(&review.store))
        else {
            continue;
        };
        reviews
            .create(&NewReview {
                store_id: *store,
                author_id: author.id,
                text: review.text.trim().to_owned(),
                rating: Rating::new(review.rating)?,
            })
            .await?;
    }

    let hearts = HeartRepository::new(&pool);
    let mut heart_count = 0;
    for user in &seed.users {
        let Some(account) = lookup(&users, &user.email) else {
            continue;
        };
        let existing = hearts.for_user(account.id).await?;
        for store in user.hearts.iter().filter_map(|name| stores.get(name)) {
            if existing.contains(store) {
                continue;
            }
            hearts.toggle(account.id, *store).await?;
            heart_count += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Users: {}", users.len());
    info!("  Stores: {}", seed.stores.len());
    info!("  Reviews: {}", seed.reviews.len());
    info!("  Hearts: {heart_count}");
    Ok(())
}

fn lookup<'a>(users: &'a HashMap<String, User>, email: &str) -> Option<&'a User> {
    let email = Email::parse(email).ok()?;
    users.get(email.as_str())
}

async fn wipe_all(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Removing existing data");
    let mut tx = pool.begin().await?;
    for table in ["hearts", "reviews", "stores", "users"] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}

/// Register each user, reusing accounts that already exist.
async fn seed_users(
    pool: &PgPool,
    seeds: &[SeedUser],
) -> Result<HashMap<String, User>, Box<dyn std::error::Error>> {
    let auth = AuthService::new(pool);
    let repo = UserRepository::new(pool);
    let mut users = HashMap::new();

    for seed in seeds {
        let user = match auth
            .register_with_password(&seed.name, &seed.email, &seed.password, &seed.password)
            .await
        {
            Ok(user) => user,
            Err(AuthError::UserAlreadyExists) => {
                info!(email = %seed.email, "User already exists, reusing");
                repo.get_by_email(&Email::parse(&seed.email)?)
                    .await?
                    .ok_or("user disappeared while seeding")?
            }
            Err(e) => return Err(e.into()),
        };
        users.insert(user.email.as_str().to_owned(), user);
    }

    Ok(users)
}

async fn seed_stores(
    pool: &PgPool,
    seeds: &[SeedStore],
    users: &HashMap<String, User>,
) -> Result<HashMap<String, StoreId>, Box<dyn std::error::Error>> {
    // Seeded stores carry no photos, so the upload directory is never written.
    let uploader = PhotoUploader::new(PathBuf::from("uploads"));
    let service = StoreService::new(pool, &uploader);
    let mut stores = HashMap::new();

    for seed in seeds {
        let author = lookup(users, &seed.author)
            .ok_or_else(|| format!("unknown author {}", seed.author))?;
        let store = service
            .create(&seed.form(), None, &CurrentUser::from(author))
            .await?;
        info!(slug = %store.slug, "Seeded store");
        stores.entry(seed.name.clone()).or_insert(store.id);
    }

    Ok(stores)
}
