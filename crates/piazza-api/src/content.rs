use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use piazza_types::api::{
    AddCommentRequest, Claims, CreateEventRequest, CreatePostRequest, CreateProductRequest,
    CreateStoryRequest,
};

use crate::error::ApiError;
use crate::state::AppState;

const CONDITIONS: &[&str] = &["new", "likenew", "good", "fair", "poor"];

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("Content is required".into()));
    }

    let id = Uuid::new_v4();
    let db = state.db.clone();
    let author_id = claims.sub.to_string();
    let content = req.content.clone();
    tokio::task::spawn_blocking(move || {
        db.create_post(&id.to_string(), &author_id, &content, &Utc::now().to_rfc3339())
    })
    .await
    .map_err(ApiError::join)??;

    Ok((StatusCode::CREATED, Json(json!({ "id": id, "type": "post" }))))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("Product name is required".into()));
    }
    if req.price < 0.0 {
        return Err(ApiError::Validation("Price must not be negative".into()));
    }
    let condition = req.condition.unwrap_or_else(|| "new".to_string());
    if !CONDITIONS.contains(&condition.as_str()) {
        return Err(ApiError::Validation("Invalid product condition".into()));
    }

    let id = Uuid::new_v4();
    let db = state.db.clone();
    let author_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || {
        db.create_product(
            &id.to_string(),
            &author_id,
            &req.title,
            &req.description,
            req.price,
            &req.category,
            &condition,
            &Utc::now().to_rfc3339(),
        )
    })
    .await
    .map_err(ApiError::join)??;

    Ok((StatusCode::CREATED, Json(json!({ "id": id, "type": "product" }))))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.event_title.trim().is_empty() {
        return Err(ApiError::Validation("Event title is required".into()));
    }
    if req.event_details.trim().is_empty() {
        return Err(ApiError::Validation("Event details are required".into()));
    }
    if req.event_location.trim().is_empty() {
        return Err(ApiError::Validation("Event location is required".into()));
    }

    let id = Uuid::new_v4();
    let db = state.db.clone();
    let author_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || {
        db.create_event(
            &id.to_string(),
            &author_id,
            &req.event_title,
            &req.event_details,
            &req.event_date.to_rfc3339(),
            &req.event_location,
            &Utc::now().to_rfc3339(),
        )
    })
    .await
    .map_err(ApiError::join)??;

    Ok((StatusCode::CREATED, Json(json!({ "id": id, "type": "event" }))))
}

pub async fn create_story(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateStoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Validation("Story text is required".into()));
    }

    let id = Uuid::new_v4();
    let db = state.db.clone();
    let author_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || {
        db.create_story(&id.to_string(), &author_id, &req.text, &Utc::now().to_rfc3339())
    })
    .await
    .map_err(ApiError::join)??;

    Ok((StatusCode::CREATED, Json(json!({ "id": id, "type": "story" }))))
}

// -- Engagement --

async fn toggle_like(
    state: AppState,
    claims: Claims,
    content_type: &'static str,
    content_id: Uuid,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let id = content_id.to_string();

    let liked = tokio::task::spawn_blocking(move || {
        if !db.content_exists(content_type, &id)? {
            return Ok(None);
        }
        db.toggle_like(content_type, &id, &user_id, &Utc::now().to_rfc3339())
            .map(Some)
    })
    .await
    .map_err(ApiError::join)??
    .ok_or_else(|| ApiError::NotFound(format!("{content_type} not found")))?;

    Ok(Json(json!({ "liked": liked })))
}

pub async fn like_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    toggle_like(state, claims, "post", id).await
}

pub async fn like_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    toggle_like(state, claims, "product", id).await
}

pub async fn like_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    toggle_like(state, claims, "event", id).await
}

async fn add_comment(
    state: AppState,
    claims: Claims,
    content_type: &'static str,
    content_id: Uuid,
    req: AddCommentRequest,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("Comment content is required".into()));
    }

    let comment_id = Uuid::new_v4();
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let id = content_id.to_string();
    let parent_id = req.parent_id.map(|p| p.to_string());

    let found = tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        if !db.content_exists(content_type, &id)? {
            return Ok(false);
        }
        db.add_comment(
            &comment_id.to_string(),
            content_type,
            &id,
            &user_id,
            &req.content,
            parent_id.as_deref(),
            &Utc::now().to_rfc3339(),
        )?;
        Ok(true)
    })
    .await
    .map_err(ApiError::join)??;

    if !found {
        return Err(ApiError::NotFound(format!("{content_type} not found")));
    }

    Ok((StatusCode::CREATED, Json(json!({ "id": comment_id }))))
}

pub async fn comment_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    add_comment(state, claims, "post", id, req).await
}

pub async fn comment_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    add_comment(state, claims, "product", id, req).await
}

pub async fn comment_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    add_comment(state, claims, "event", id, req).await
}

pub async fn toggle_interested(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let event_id = id.to_string();

    let interested = tokio::task::spawn_blocking(move || {
        if !db.content_exists("event", &event_id)? {
            return Ok(None);
        }
        db.toggle_interest(&event_id, &user_id, &Utc::now().to_rfc3339())
            .map(Some)
    })
    .await
    .map_err(ApiError::join)??
    .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;

    Ok(Json(json!({ "interested": interested })))
}
