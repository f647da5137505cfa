//! Store listing, store page and the add/edit forms.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use delicious_core::{PageOutcome, Pagination, StoreId};

use crate::db::StoreRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::auth::current_user;
use crate::middleware::{FlashLevel, PageContext, RequireUser};
use crate::models::{Review, Store, StoreCard};
use crate::routes::{flash_errors, redirect_with_flash, viewer_hearts};
use crate::services::stores::{StoreForm, StoreService};
use crate::services::uploads::PhotoUpload;
use crate::state::AppState;

/// Largest store form accepted, photo included.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Tags offered on the store form.
pub const TAG_CHOICES: [&str; 5] = ["Wifi", "Open Late", "Family Friendly", "Vegetarian", "Licensed"];

/// Body limit for the routes that take a multipart store form.
#[must_use]
pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(MAX_UPLOAD_BYTES)
}

// =============================================================================
// View Types
// =============================================================================

/// Previous/next links for a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page: u32,
    pub pages: u32,
    pub count: u64,
}

impl Pager {
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn prev(&self) -> u32 {
        self.page.saturating_sub(1)
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.pages
    }

    #[must_use]
    pub const fn next(&self) -> u32 {
        self.page.saturating_add(1)
    }
}

/// One tag checkbox on the store form.
#[derive(Debug, Clone)]
pub struct TagChoice {
    pub name: &'static str,
    pub checked: bool,
}

/// Values pre-filled into the store form.
#[derive(Debug, Clone, Default)]
pub struct FormView {
    pub name: String,
    pub description: String,
    pub address: String,
    pub lng: String,
    pub lat: String,
    pub version: Option<i32>,
    pub photo_url: Option<String>,
}

impl FormView {
    fn from_store(store: &Store) -> Self {
        Self {
            name: store.name.clone(),
            description: store.description.clone(),
            address: store.location.address.clone(),
            lng: store.longitude().to_string(),
            lat: store.latitude().to_string(),
            version: Some(store.version),
            photo_url: store.photo.as_ref().map(|_| store.photo_url()),
        }
    }
}

fn tag_choices(store: Option<&Store>) -> Vec<TagChoice> {
    TAG_CHOICES
        .iter()
        .map(|&name| TagChoice {
            name,
            checked: store.is_some_and(|s| s.has_tag(name)),
        })
        .collect()
}

// =============================================================================
// Templates
// =============================================================================

/// Store listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "stores/index.html")]
pub struct StoresTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub cards: Vec<StoreCard>,
    pub pager: Pager,
}

/// Add/edit store form template.
#[derive(Template, WebTemplate)]
#[template(path = "stores/form.html")]
pub struct StoreFormTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub action: String,
    pub form: FormView,
    pub choices: Vec<TagChoice>,
}

/// Store page template.
#[derive(Template, WebTemplate)]
#[template(path = "stores/show.html")]
pub struct StoreTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub store: Store,
    pub reviews: Vec<Review>,
    pub hearted: bool,
    pub can_edit: bool,
}

// =============================================================================
// Listing
// =============================================================================

/// First page of the store listing.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, session: Session) -> Result<Response> {
    listing(&state, &session, Pagination::stores(None)).await
}

/// A numbered page of the store listing. Non-numeric pages read as page 1.
#[instrument(skip(state, session))]
pub async fn index_page(
    State(state): State<AppState>,
    session: Session,
    Path(page): Path<String>,
) -> Result<Response> {
    listing(&state, &session, Pagination::stores(page.parse().ok())).await
}

async fn listing(state: &AppState, session: &Session, pagination: Pagination) -> Result<Response> {
    let user = current_user(session).await;
    let stores = StoreRepository::new(state.pool());

    let (page_stores, count, hearts) = tokio::try_join!(
        stores.list_page(&pagination),
        stores.count(),
        viewer_hearts(state.pool(), user.as_ref()),
    )?;

    match pagination.resolve(page_stores.len(), count) {
        PageOutcome::RedirectTo { requested, last } => {
            redirect_with_flash(
                session,
                FlashLevel::Info,
                format!(
                    "You asked for page {requested}, but that doesn't exist. You are on page {last}."
                ),
                &format!("/stores/page/{last}"),
            )
            .await
        }
        PageOutcome::Render { page, pages, count } => Ok(StoresTemplate {
            ctx: PageContext::from_session(session).await,
            title: "Stores".to_owned(),
            cards: StoreCard::from_stores(page_stores, &hearts),
            pager: Pager { page, pages, count },
        }
        .into_response()),
    }
}

/// A store and its reviews.
///
/// Flashes are only drained once the store is found.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> Result<Response> {
    let viewer = current_user(&session).await;
    let service = StoreService::new(state.pool(), state.uploader());
    let ((store, reviews), hearts) = tokio::try_join!(service.show(&slug), async {
        viewer_hearts(state.pool(), viewer.as_ref())
            .await
            .map_err(AppError::from)
    })?;

    let ctx = PageContext::from_session(&session).await;
    let hearted = hearts.contains(&store.id);
    let can_edit = ctx.user.as_ref().is_some_and(|u| u.id == store.author_id);
    Ok(StoreTemplate {
        title: store.name.clone(),
        ctx,
        store,
        reviews,
        hearted,
        can_edit,
    }
    .into_response())
}

// =============================================================================
// Add / Edit
// =============================================================================

/// Blank store form.
pub async fn add_page(RequireUser(_user): RequireUser, ctx: PageContext) -> impl IntoResponse {
    StoreFormTemplate {
        ctx,
        title: "Add Store".to_owned(),
        action: "/add".to_owned(),
        form: FormView::default(),
        choices: tag_choices(None),
    }
}

/// Edit form, owner only.
pub async fn edit_page(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    session: Session,
    Path(id): Path<StoreId>,
) -> Result<Response> {
    let store = StoreService::new(state.pool(), state.uploader())
        .editable(id, &user)
        .await?;
    let ctx = PageContext::from_session(&session).await;

    Ok(StoreFormTemplate {
        title: format!("Edit {}", store.name),
        action: format!("/add/{}", store.id),
        form: FormView::from_store(&store),
        choices: tag_choices(Some(&store)),
        ctx,
    }
    .into_response())
}

/// Create a store from the multipart form.
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    session: Session,
    multipart: Multipart,
) -> Result<Response> {
    let (form, photo) = read_store_form(multipart).await?;

    match StoreService::new(state.pool(), state.uploader())
        .create(&form, photo, &user)
        .await
    {
        Ok(store) => {
            redirect_with_flash(
                &session,
                FlashLevel::Success,
                format!("Successfully Created {}. Care to leave a review?", store.name),
                &store.url(),
            )
            .await
        }
        Err(err) => flash_errors(&session, err, "/add").await,
    }
}

/// Update a store from the multipart form, owner only.
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    session: Session,
    Path(key): Path<String>,
    multipart: Multipart,
) -> Result<Response> {
    let id: StoreId = key
        .parse()
        .map_err(|_| AppError::NotFound(format!("store {key}")))?;
    let (form, photo) = read_store_form(multipart).await?;
    let back = format!("/stores/{id}/edit");

    match StoreService::new(state.pool(), state.uploader())
        .update(id, &form, photo, &user)
        .await
    {
        Ok(store) => {
            redirect_with_flash(
                &session,
                FlashLevel::Success,
                format!("Successfully updated {}.", store.name),
                &back,
            )
            .await
        }
        Err(err @ (AppError::Forbidden(_) | AppError::NotFound(_))) => Err(err),
        Err(err) => flash_errors(&session, err, &back).await,
    }
}

/// Collect the store form fields and the optional photo part.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a malformed body or a second photo.
pub async fn read_store_form(mut multipart: Multipart) -> Result<(StoreForm, Option<PhotoUpload>)> {
    let mut form = StoreForm::default();
    let mut photo: Option<PhotoUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == "photo" {
            if photo.is_some() {
                return Err(AppError::BadRequest(
                    "Only one photo may be uploaded".to_owned(),
                ));
            }
            let content_type = field.content_type().map(str::to_owned);
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            photo = Some(PhotoUpload {
                content_type,
                bytes,
            });
            continue;
        }

        let value = field.text().await.map_err(bad_multipart)?;
        match name.as_str() {
            "name" => form.name = value,
            "description" => form.description = value,
            "tags" => form.tags.push(value),
            "address" => form.address = value,
            "lng" => form.lng = value,
            "lat" => form.lat = value,
            "version" => form.version = value.trim().parse().ok(),
            _ => {}
        }
    }

    Ok((form, photo))
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid form submission: {}", err.body_text()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{Request, header},
    };

    use std::sync::Arc;

    use delicious_core::{Email, UserId};
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::middleware::flash;
    use crate::models::CurrentUser;
    use crate::state::test_support::lazy_state;

    const BOUNDARY: &str = "delicious-boundary";

    fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, content_type, value) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match content_type {
                Some(ct) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"f\"\r\nContent-Type: {ct}\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/add")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn read(parts: &[(&str, Option<&str>, &str)]) -> Result<(StoreForm, Option<PhotoUpload>)> {
        let multipart = Multipart::from_request(multipart_request(parts), &())
            .await
            .unwrap();
        read_store_form(multipart).await
    }

    #[tokio::test]
    async fn test_read_store_form_fields() {
        let (form, photo) = read(&[
            ("name", None, "Coffee Corner"),
            ("description", None, "Espresso"),
            ("tags", None, "Wifi"),
            ("tags", None, "Open Late"),
            ("address", None, "1 King St"),
            ("lng", None, "-79.38"),
            ("lat", None, "43.65"),
            ("version", None, "3"),
        ])
        .await
        .unwrap();

        assert_eq!(form.name, "Coffee Corner");
        assert_eq!(form.tags, vec!["Wifi".to_owned(), "Open Late".to_owned()]);
        assert_eq!(form.version, Some(3));
        assert!(photo.is_none());
        assert!(form.validate().is_ok());
    }

    #[tokio::test]
    async fn test_read_store_form_keeps_photo_part() {
        let (_, photo) = read(&[("name", None, "A"), ("photo", Some("text/plain"), "hello")])
            .await
            .unwrap();

        let photo = photo.unwrap();
        assert_eq!(photo.content_type.as_deref(), Some("text/plain"));
        assert_eq!(photo.bytes.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_read_store_form_rejects_second_photo() {
        let result = read(&[
            ("photo", Some("image/png"), "a"),
            ("photo", Some("image/png"), "b"),
        ])
        .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_pager_links() {
        let first = Pager { page: 1, pages: 3, count: 10 };
        assert!(!first.has_prev());
        assert!(first.has_next());
        assert_eq!(first.next(), 2);

        let last = Pager { page: 3, pages: 3, count: 10 };
        assert!(last.has_prev());
        assert_eq!(last.prev(), 2);
        assert!(!last.has_next());
    }

    #[test]
    fn test_tag_choices_reflect_store_tags() {
        let choices = tag_choices(None);
        assert_eq!(choices.len(), TAG_CHOICES.len());
        assert!(choices.iter().all(|c| !c.checked));
    }

    fn memory_session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_unknown_store_keeps_pending_flashes() {
        let session = memory_session();
        flash::push(&session, FlashLevel::Success, "Saved!").await.unwrap();

        let err = show(
            State(lazy_state()),
            session.clone(),
            Path("Not a slug!".to_owned()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)), "{err:?}");

        let flashes = flash::take(&session).await.unwrap();
        assert_eq!(flashes.len(), 1);
        assert_eq!(flashes[0].message, "Saved!");
    }

    #[tokio::test]
    async fn test_failed_edit_lookup_keeps_pending_flashes() {
        let session = memory_session();
        flash::push(&session, FlashLevel::Success, "Saved!").await.unwrap();
        let user = CurrentUser {
            id: UserId::new(1),
            name: "Wes".to_owned(),
            email: Email::parse("wes@example.com").unwrap(),
        };

        // The lazy pool cannot connect, so the lookup fails.
        let result = edit_page(
            State(lazy_state()),
            RequireUser(user),
            session.clone(),
            Path(StoreId::new(1)),
        )
        .await;
        assert!(result.is_err());

        assert_eq!(flash::take(&session).await.unwrap().len(), 1);
    }
}
