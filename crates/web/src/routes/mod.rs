//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Stores
//! GET  /                       - Store listing, page 1
//! GET  /stores                 - Store listing, page 1
//! GET  /stores/page/{page}     - Store listing page (past the end redirects)
//! GET  /add                    - New store form (auth)
//! POST /add                    - Create store, multipart (auth)
//! POST /add/{id}               - Update store, multipart (auth, owner)
//! GET  /store/{slug}           - Store page with reviews
//! POST /store/{id}             - Update store, multipart (auth, owner)
//! GET  /stores/{id}/edit       - Edit form (auth, owner)
//!
//! # Tags and rankings
//! GET  /tags                   - Tag list and every tagged store
//! GET  /tags/{tag}             - Tag list and the stores with that tag
//! GET  /top                    - Top rated stores
//! GET  /map                    - Map page
//! GET  /hearts                 - Hearted stores (auth)
//!
//! # Reviews
//! POST /reviews/{store_id}     - Leave a review (auth)
//!
//! # Auth (POSTs are rate limited)
//! GET  /login                  - Login page
//! POST /login                  - Login action
//! GET  /register               - Register page
//! POST /register               - Register action
//! GET  /logout                 - Logout action
//!
//! # Account
//! GET  /account                - Profile form (auth)
//! POST /account                - Update name and email (auth)
//! POST /account/forgot         - Request a reset email (rate limited)
//! GET  /account/reset/{token}  - Reset form
//! POST /account/reset/{token}  - Set a new password (rate limited)
//!
//! # JSON API
//! GET  /api/search?q=          - Full-text search
//! GET  /api/search/suggest?q=  - Type-ahead HTML fragment
//! GET  /api/stores/near        - Stores within 10 km of lng/lat
//! POST /api/stores/{id}/heart  - Toggle a heart (auth)
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod pages;
pub mod reviews;
pub mod stores;

use std::collections::HashSet;

use axum::{
    Router,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use sqlx::PgPool;
use tower_sessions::Session;

use delicious_core::StoreId;

use crate::db::{HeartRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::{FlashLevel, auth_rate_limiter, flash};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Create the store routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(stores::index))
        .route("/stores", get(stores::index))
        .route("/stores/page/{page}", get(stores::index_page))
        .route("/add", get(stores::add_page).post(stores::create))
        .route("/add/{id}", post(stores::update))
        // GET takes a slug, POST an id: one route so the paths don't clash.
        .route("/store/{key}", get(stores::show).post(stores::update))
        .route("/stores/{id}/edit", get(stores::edit_page))
        .layer(stores::upload_body_limit())
}

/// Create the tag, ranking and map routes router.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/tags", get(pages::tags))
        .route("/tags/{tag}", get(pages::tag))
        .route("/top", get(pages::top))
        .route("/map", get(pages::map))
        .route("/hearts", get(pages::hearts))
        .route("/reviews/{store_id}", post(reviews::create))
}

/// Create the auth routes router.
pub fn auth_routes(trust_proxy: bool) -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/account/forgot", post(account::forgot))
        .route("/account/reset/{token}", post(account::reset))
        .layer(auth_rate_limiter(trust_proxy));

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .route("/logout", get(auth::logout))
        .route("/account", get(account::index).post(account::update))
        .route("/account/reset/{token}", get(account::reset_page))
        .merge(limited)
}

/// Create the JSON API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(api::search))
        .route("/search/suggest", get(api::suggest))
        .route("/stores/near", get(api::near))
        .route("/stores/{id}/heart", post(api::heart))
}

/// Create all routes for the site.
pub fn routes(trust_proxy: bool) -> Router<AppState> {
    Router::new()
        .merge(store_routes())
        .merge(page_routes())
        .merge(auth_routes(trust_proxy))
        .nest("/api", api_routes())
}

/// Queue a flash and redirect.
pub(crate) async fn redirect_with_flash(
    session: &Session,
    level: FlashLevel,
    message: impl Into<String>,
    to: &str,
) -> Result<Response> {
    flash::push(session, level, message).await?;
    Ok(Redirect::to(to).into_response())
}

/// Turn an error the user can fix into error flashes plus a redirect to
/// `back`; anything else propagates.
pub(crate) async fn flash_errors(session: &Session, err: AppError, back: &str) -> Result<Response> {
    match err.user_messages() {
        Some(messages) => {
            flash::push_all(session, FlashLevel::Error, messages).await?;
            Ok(Redirect::to(back).into_response())
        }
        None => Err(err),
    }
}

/// Stores the viewer has hearted; empty for anonymous visitors.
pub(crate) async fn viewer_hearts(
    pool: &PgPool,
    user: Option<&CurrentUser>,
) -> std::result::Result<HashSet<StoreId>, RepositoryError> {
    match user {
        Some(user) => HeartRepository::new(pool).for_user(user.id).await,
        None => Ok(HashSet::new()),
    }
}
