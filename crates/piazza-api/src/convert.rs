use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use piazza_db::models::{
    EventRow, MessageRow, PostRow, ProductRow, ReactionRow, StoryRow,
};
use piazza_types::api::{EventSnapshot, MessageResponse, ProductSnapshot, Reaction};
use piazza_types::models::{Author, ContentItem, Event, MessageStatus, Post, Product, Story};

/// Parse a stored timestamp. Rows written by this server are RFC 3339, but
/// SQLite's own "YYYY-MM-DD HH:MM:SS" shape is accepted as naive UTC too.
pub fn parse_ts(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

pub fn parse_id(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}' on {}: {}", raw, context, e);
        Uuid::default()
    })
}

fn author(id: &str, username: &str, name: &str, context: &str) -> Author {
    Author {
        id: parse_id(id, context),
        username: username.to_string(),
        name: name.to_string(),
    }
}

pub fn post_item(row: PostRow) -> ContentItem {
    ContentItem::Post(Post {
        id: parse_id(&row.id, "post"),
        author: author(&row.author_id, &row.author_username, &row.author_name, "post"),
        content: row.content,
        likes: row.likes,
        comments: row.comments,
        shares: row.shares,
        liked_by_viewer: row.viewer_liked,
        commented_by_viewer: row.viewer_commented,
        created_at: parse_ts(&row.created_at, "post"),
        updated_at: parse_ts(&row.updated_at, "post"),
    })
}

pub fn product_item(row: ProductRow) -> ContentItem {
    ContentItem::Product(Product {
        id: parse_id(&row.id, "product"),
        author: author(&row.author_id, &row.author_username, &row.author_name, "product"),
        title: row.title,
        description: row.description,
        price: row.price,
        category: row.category,
        condition: row.condition,
        likes: row.likes,
        comments: row.comments,
        shares: row.shares,
        liked_by_viewer: row.viewer_liked,
        commented_by_viewer: row.viewer_commented,
        created_at: parse_ts(&row.created_at, "product"),
        updated_at: parse_ts(&row.updated_at, "product"),
    })
}

pub fn event_item(row: EventRow) -> ContentItem {
    ContentItem::Event(Event {
        id: parse_id(&row.id, "event"),
        author: author(&row.author_id, &row.author_username, &row.author_name, "event"),
        event_title: row.event_title,
        event_details: row.event_details,
        event_date: parse_ts(&row.event_date, "event"),
        event_location: row.event_location,
        likes: row.likes,
        comments: row.comments,
        shares: row.shares,
        interested: row.interested,
        liked_by_viewer: row.viewer_liked,
        commented_by_viewer: row.viewer_commented,
        viewer_interested: row.viewer_interested,
        created_at: parse_ts(&row.created_at, "event"),
        updated_at: parse_ts(&row.updated_at, "event"),
    })
}

pub fn story_item(row: StoryRow) -> ContentItem {
    ContentItem::Story(Story {
        id: parse_id(&row.id, "story"),
        author: author(&row.author_id, &row.author_username, &row.author_name, "story"),
        text: row.text,
        created_at: parse_ts(&row.created_at, "story"),
        updated_at: parse_ts(&row.updated_at, "story"),
    })
}

/// A message row plus its reactions, formatted for clients.
pub fn message_response(row: MessageRow, reactions: &[ReactionRow]) -> MessageResponse {
    let product = row.product_json.as_deref().and_then(|raw| {
        serde_json::from_str::<ProductSnapshot>(raw)
            .map_err(|e| warn!("Corrupt product snapshot on message '{}': {}", row.id, e))
            .ok()
    });
    let event = row.event_json.as_deref().and_then(|raw| {
        serde_json::from_str::<EventSnapshot>(raw)
            .map_err(|e| warn!("Corrupt event snapshot on message '{}': {}", row.id, e))
            .ok()
    });

    let status = MessageStatus::parse(&row.status).unwrap_or_else(|| {
        warn!("Corrupt status '{}' on message '{}'", row.status, row.id);
        MessageStatus::Sent
    });

    MessageResponse {
        id: parse_id(&row.id, "message"),
        conversation_id: parse_id(&row.conversation_id, "message"),
        sender: author(&row.sender_id, &row.sender_username, &row.sender_name, "message"),
        content: row.content,
        product,
        event,
        is_ai_response: row.is_ai_response,
        is_read: row.is_read,
        status,
        reactions: reactions
            .iter()
            .filter(|r| r.message_id == row.id)
            .map(|r| Reaction {
                user_id: parse_id(&r.user_id, "reaction"),
                emoji: r.emoji.clone(),
            })
            .collect(),
        pinned_by: row
            .pinned_by
            .as_deref()
            .map(|id| vec![parse_id(id, "pin")])
            .unwrap_or_default(),
        created_at: parse_ts(&row.created_at, "message"),
    }
}
