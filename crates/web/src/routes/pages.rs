//! Tag browsing, rankings, the map and the hearted-stores page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use delicious_core::TagCount;

use crate::db::StoreRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireUser};
use crate::models::{StoreCard, TopStore};
use crate::routes::viewer_hearts;
use crate::services::stores::StoreService;
use crate::state::AppState;

/// One entry of the tag list.
#[derive(Debug, Clone)]
pub struct TagLink {
    pub tag: String,
    pub count: i64,
    pub active: bool,
}

impl TagLink {
    fn list(counts: Vec<TagCount>, active: Option<&str>) -> Vec<Self> {
        counts
            .into_iter()
            .map(|TagCount { tag, count }| Self {
                active: active == Some(tag.as_str()),
                tag,
                count,
            })
            .collect()
    }

    /// Link to the tag page.
    #[must_use]
    pub fn url(&self) -> String {
        format!("/tags/{}", urlencoding::encode(&self.tag))
    }
}

/// Tag page template.
#[derive(Template, WebTemplate)]
#[template(path = "tags.html")]
pub struct TagsTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub tags: Vec<TagLink>,
    pub cards: Vec<StoreCard>,
}

/// Top stores page template.
#[derive(Template, WebTemplate)]
#[template(path = "top.html")]
pub struct TopTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub stores: Vec<TopStore>,
}

/// Map page template.
#[derive(Template, WebTemplate)]
#[template(path = "map.html")]
pub struct MapTemplate {
    pub ctx: PageContext,
    pub title: String,
}

/// Hearted stores page template.
#[derive(Template, WebTemplate)]
#[template(path = "hearts.html")]
pub struct HeartsTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub cards: Vec<StoreCard>,
}

/// Every tag, with every store that has at least one tag.
#[instrument(skip_all)]
pub async fn tags(State(state): State<AppState>, ctx: PageContext) -> Result<Response> {
    render_tags(&state, ctx, None).await
}

/// Every tag, with the stores carrying `tag`.
#[instrument(skip(state, ctx))]
pub async fn tag(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(tag): Path<String>,
) -> Result<Response> {
    render_tags(&state, ctx, Some(tag)).await
}

async fn render_tags(state: &AppState, ctx: PageContext, active: Option<String>) -> Result<Response> {
    let stores = StoreRepository::new(state.pool());

    let (tags, tagged, hearts) = tokio::try_join!(
        stores.tag_list(),
        stores.list_by_tag(active.as_deref()),
        viewer_hearts(state.pool(), ctx.user.as_ref()),
    )?;

    Ok(TagsTemplate {
        tags: TagLink::list(tags, active.as_deref()),
        title: active.unwrap_or_else(|| "Tags".to_owned()),
        cards: StoreCard::from_stores(tagged, &hearts),
        ctx,
    }
    .into_response())
}

/// The best rated stores with at least two reviews.
#[instrument(skip_all)]
pub async fn top(State(state): State<AppState>, ctx: PageContext) -> Result<Response> {
    let stores = StoreService::new(state.pool(), state.uploader())
        .top_stores()
        .await?;

    Ok(TopTemplate {
        ctx,
        title: format!("Top {} Stores", stores.len()),
        stores,
    }
    .into_response())
}

/// The map page; results are fetched client-side from `/api/stores/near`.
pub async fn map(ctx: PageContext) -> impl IntoResponse {
    MapTemplate {
        ctx,
        title: "Map".to_owned(),
    }
}

/// Stores the signed-in user has hearted.
#[instrument(skip_all)]
pub async fn hearts(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ctx: PageContext,
) -> Result<Response> {
    let stores = StoreRepository::new(state.pool()).hearted_by(user.id).await?;
    let hearted = stores.iter().map(|s| s.id).collect();

    Ok(HeartsTemplate {
        ctx,
        title: "Hearted Stores".to_owned(),
        cards: StoreCard::from_stores(stores, &hearted),
    }
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_links_mark_active_and_keep_order() {
        let counts = vec![
            TagCount {
                tag: "Wifi".to_owned(),
                count: 2,
            },
            TagCount {
                tag: "Open Late".to_owned(),
                count: 1,
            },
        ];

        let links = TagLink::list(counts, Some("Open Late"));
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].tag, "Wifi");
        assert!(!links[0].active);
        assert!(links[1].active);
        assert_eq!(links[1].url(), "/tags/Open%20Late");
    }
}
