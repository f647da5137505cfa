//! JSON API: search, type-ahead suggestions, nearby stores and hearts.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use delicious_core::{GeoPoint, NearQuery, StoreId};

use crate::db::{HeartRepository, RepositoryError, StoreRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::{Store, StoreSummary};
use crate::state::AppState;

/// Results returned by the search endpoints.
pub const SEARCH_LIMIT: i64 = 5;

/// `?q=` for the search endpoints.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `?lng=&lat=` for the nearby endpoint, parsed by hand so malformed
/// numbers produce a 400 with a useful message.
#[derive(Debug, Deserialize)]
pub struct NearParams {
    pub lng: Option<String>,
    pub lat: Option<String>,
}

/// Body of the heart toggle response.
#[derive(Debug, Serialize)]
pub struct HeartsResponse {
    pub hearts: Vec<StoreId>,
}

/// Type-ahead result panel.
#[derive(Template, WebTemplate)]
#[template(path = "partials/search_results.html")]
pub struct SearchResultsTemplate {
    pub query: String,
    pub stores: Vec<Store>,
}

async fn run_search(state: &AppState, query: &str) -> Result<Vec<Store>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    Ok(StoreRepository::new(state.pool())
        .search(query, SEARCH_LIMIT)
        .await?)
}

/// Full-text search over store names and descriptions.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<StoreSummary>>> {
    let stores = run_search(&state, &query.q).await?;
    Ok(Json(stores.into_iter().map(StoreSummary::from).collect()))
}

/// The search rendered as the escaped HTML fragment the type-ahead inserts.
#[instrument(skip(state))]
pub async fn suggest(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response> {
    let q = query.q.trim();
    if q.is_empty() {
        return Ok(().into_response());
    }

    let stores = run_search(&state, q).await?;
    Ok(SearchResultsTemplate {
        query: q.to_owned(),
        stores,
    }
    .into_response())
}

/// Up to ten stores within 10 km of the given point, nearest first.
#[instrument(skip(state))]
pub async fn near(
    State(state): State<AppState>,
    Query(params): Query<NearParams>,
) -> Result<Json<Vec<StoreSummary>>> {
    let origin = GeoPoint::parse(params.lng.as_deref(), params.lat.as_deref())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let stores = StoreRepository::new(state.pool())
        .near(&NearQuery::around(origin))
        .await?;
    Ok(Json(stores.into_iter().map(StoreSummary::from).collect()))
}

/// Add or remove a heart; answers with every store the user has hearted.
pub async fn heart(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(store): Path<StoreId>,
) -> Result<Json<HeartsResponse>> {
    let hearts = HeartRepository::new(state.pool())
        .toggle(user.id, store)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound(format!("store {store}")),
            other => AppError::Database(other),
        })?;

    tracing::info!(user_id = %user.id, store_id = %store, hearts = hearts.len(), "Heart toggled");
    Ok(Json(HeartsResponse { hearts }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use delicious_core::{Location, Slug, UserId};

    use super::*;

    fn store(name: &str, slug: &str) -> Store {
        Store {
            id: StoreId::new(1),
            name: name.to_owned(),
            slug: Slug::parse(slug).unwrap(),
            description: String::new(),
            tags: Vec::new(),
            created_at: Utc::now(),
            location: Location {
                point: GeoPoint::new(0.0, 0.0).unwrap(),
                address: "Somewhere".to_owned(),
            },
            photo: None,
            author_id: UserId::new(1),
            version: 1,
        }
    }

    #[test]
    fn test_suggestions_escape_store_names() {
        let html = SearchResultsTemplate {
            query: "img".to_owned(),
            stores: vec![store("<img src=x onerror=alert(1)>", "img")],
        }
        .render()
        .unwrap();

        assert!(!html.contains("<img"));
        assert!(html.contains("img src=x onerror=alert(1)"));
        assert!(html.contains("href=\"/store/img\""));
    }

    /// Tags and attribute names in `html`, closing tags skipped.
    fn markup(html: &str) -> Vec<(String, Vec<String>)> {
        html.split('<')
            .skip(1)
            .filter(|tag| !tag.starts_with('/'))
            .map(|tag| {
                let inner = tag.split('>').next().unwrap_or_default();
                let mut tokens = inner.split_whitespace();
                let name = tokens.next().unwrap_or_default().to_owned();
                let attrs = tokens
                    .filter_map(|t| t.split_once('=').map(|(attr, _)| attr.to_owned()))
                    .collect();
                (name, attrs)
            })
            .collect()
    }

    #[test]
    fn test_suggestions_use_only_markup_the_widget_keeps() {
        for stores in [vec![store("\"><a onclick=x href=javascript:alert(1)>", "a")], Vec::new()] {
            let html = SearchResultsTemplate {
                query: "\" onmouseover=\"x".to_owned(),
                stores,
            }
            .render()
            .unwrap();

            for (tag, attrs) in markup(&html) {
                assert!(["a", "div", "span", "strong", "em"].contains(&tag.as_str()), "{tag}");
                assert!(attrs.iter().all(|a| a == "class" || a == "href"), "{attrs:?}");
            }
            assert!(!html.contains("javascript:alert(1)\""));
            assert!(html.split("href=\"").skip(1).all(|href| href.starts_with('/')));
        }
    }

    #[test]
    fn test_empty_suggestions_escape_query() {
        let html = SearchResultsTemplate {
            query: "<script>".to_owned(),
            stores: Vec::new(),
        }
        .render()
        .unwrap();

        assert!(html.contains("No results for "));
        assert!(html.contains("script"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_hearts_response_shape() {
        let body = serde_json::to_value(HeartsResponse {
            hearts: vec![StoreId::new(3), StoreId::new(9)],
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "hearts": [3, 9] }));
    }
}
