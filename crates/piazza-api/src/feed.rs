use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::{Duration, Utc};
use uuid::Uuid;

use piazza_db::Database;
use piazza_feed::{interest_tokens, rank_feed, rank_suggestions};
use piazza_types::api::{Claims, FeedRequest, FeedResponse};
use piazza_types::models::ContentItem;

use crate::convert;
use crate::error::ApiError;
use crate::state::AppState;

/// How far back stories stay visible.
const STORY_WINDOW_HOURS: i64 = 24;

/// Per-kind fetch cap when building the suggestion corpus.
const SUGGESTION_FETCH_LIMIT: u32 = 10;

struct FeedInputs {
    corpus: Vec<ContentItem>,
    interests: Vec<String>,
}

fn load_feed_inputs(db: &Database, viewer_id: &str) -> anyhow::Result<FeedInputs> {
    let cutoff = (Utc::now() - Duration::hours(STORY_WINDOW_HOURS)).to_rfc3339();

    let mut corpus: Vec<ContentItem> = Vec::new();
    corpus.extend(db.list_posts(viewer_id, None, None)?.into_iter().map(convert::post_item));
    corpus.extend(
        db.list_products(viewer_id, None, None)?
            .into_iter()
            .map(convert::product_item),
    );
    corpus.extend(db.list_events(viewer_id, None, None)?.into_iter().map(convert::event_item));
    corpus.extend(db.list_stories_since(&cutoff)?.into_iter().map(convert::story_item));

    let interests = interest_tokens(&db.user_interest_texts(viewer_id)?);
    Ok(FeedInputs { corpus, interests })
}

fn load_suggestion_inputs(db: &Database, viewer_id: &str) -> anyhow::Result<FeedInputs> {
    let mut corpus: Vec<ContentItem> = Vec::new();
    corpus.extend(
        db.list_posts(viewer_id, Some(viewer_id), Some(SUGGESTION_FETCH_LIMIT))?
            .into_iter()
            .map(convert::post_item),
    );
    corpus.extend(
        db.list_products(viewer_id, Some(viewer_id), Some(SUGGESTION_FETCH_LIMIT))?
            .into_iter()
            .map(convert::product_item),
    );
    corpus.extend(
        db.list_events(viewer_id, Some(viewer_id), Some(SUGGESTION_FETCH_LIMIT))?
            .into_iter()
            .map(convert::event_item),
    );

    let interests = interest_tokens(&db.user_interest_texts(viewer_id)?);
    Ok(FeedInputs { corpus, interests })
}

async fn resolve_viewer(state: &AppState, raw_id: &str) -> Result<Uuid, ApiError> {
    let viewer_id: Uuid = raw_id
        .parse()
        .map_err(|_| ApiError::Validation("Invalid user ID".into()))?;

    let db = state.db.clone();
    let id = viewer_id.to_string();
    let exists = tokio::task::spawn_blocking(move || db.user_exists(&id))
        .await
        .map_err(ApiError::join)??;
    if !exists {
        return Err(ApiError::NotFound("User not found".into()));
    }
    Ok(viewer_id)
}

/// `POST /api/feed`: the ranked feed for one user.
pub async fn generate_feed(
    State(state): State<AppState>,
    Json(req): Json<FeedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer_id = resolve_viewer(&state, &req.user_id).await?;

    let db = state.db.clone();
    let inputs = tokio::task::spawn_blocking(move || load_feed_inputs(&db, &viewer_id.to_string()))
        .await
        .map_err(ApiError::join)??;

    let data = rank_feed(inputs.corpus, viewer_id, &inputs.interests, Utc::now());
    tracing::debug!(%viewer_id, items = data.len(), "feed generated");

    Ok(Json(FeedResponse {
        message: "Feed generated successfully".into(),
        data,
    }))
}

/// `POST /api/suggest-content`: ranked suggestions excluding the viewer's
/// own content.
pub async fn suggest_content(
    State(state): State<AppState>,
    Json(req): Json<FeedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer_id = resolve_viewer(&state, &req.user_id).await?;

    let db = state.db.clone();
    let inputs =
        tokio::task::spawn_blocking(move || load_suggestion_inputs(&db, &viewer_id.to_string()))
            .await
            .map_err(ApiError::join)??;

    let data = rank_suggestions(inputs.corpus, viewer_id, &inputs.interests);
    tracing::debug!(%viewer_id, items = data.len(), "suggestions generated");

    Ok(Json(FeedResponse {
        message: "Content suggestions generated successfully".into(),
        data,
    }))
}

/// `GET /api/feed`: the unranked merge of posts, products and events,
/// newest first. Stories and scores stay out of this simpler view.
pub async fn get_feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let viewer = claims.sub.to_string();
    let mut items = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = Vec::new();
        items.extend(db.list_posts(&viewer, None, None)?.into_iter().map(convert::post_item));
        items.extend(
            db.list_products(&viewer, None, None)?
                .into_iter()
                .map(convert::product_item),
        );
        items.extend(db.list_events(&viewer, None, None)?.into_iter().map(convert::event_item));
        Ok(items)
    })
    .await
    .map_err(ApiError::join)??;

    if items.is_empty() {
        return Err(ApiError::NotFound("No items found for the feed.".into()));
    }

    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    Ok(Json(items))
}
