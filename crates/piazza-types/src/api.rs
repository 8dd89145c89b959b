use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Author, ContentItem, MessageStatus};

// -- JWT Claims --

/// JWT claims shared across piazza-api (REST middleware) and piazza-gateway
/// (WebSocket handshake). Canonical definition lives here in piazza-types
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Feed --

#[derive(Debug, Deserialize)]
pub struct FeedRequest {
    /// Kept as a string so a malformed id surfaces as a 400 with a message,
    /// not a deserialization rejection.
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub message: String,
    pub data: Vec<ScoredItem>,
}

/// A content item plus its computed relevance score. Transient: built
/// during ranking, serialized, discarded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub score: f64,
    pub is_own_content: bool,
    pub is_interested: bool,
}

// -- Content creation --

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub event_title: String,
    pub event_details: String,
    pub event_date: DateTime<Utc>,
    pub event_location: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateStoryRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    pub content: String,
    pub parent_id: Option<Uuid>,
}

// -- Messaging --

/// Product card snapshot attached to a message, denormalized at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub image: Option<String>,
    pub condition: Option<String>,
    pub category: Option<String>,
}

/// Event card snapshot attached to a message, denormalized at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub id: String,
    pub title: String,
    pub date: Option<String>,
    pub location: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: Option<String>,
    pub content: Option<String>,
    pub product: Option<ProductSnapshot>,
    pub event: Option<EventSnapshot>,
    #[serde(default, rename = "isAIResponse")]
    pub is_ai_response: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub receiver_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactRequest {
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user_id: Uuid,
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Author,
    pub content: String,
    pub product: Option<ProductSnapshot>,
    pub event: Option<EventSnapshot>,
    #[serde(rename = "isAIResponse")]
    pub is_ai_response: bool,
    pub is_read: bool,
    pub status: MessageStatus,
    pub reactions: Vec<Reaction>,
    pub pinned_by: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: Uuid,
    pub participants: Vec<Author>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message: Option<MessageResponse>,
    pub unread_count: u32,
}
