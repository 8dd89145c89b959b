use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized author info attached to content and messages so clients
/// never need a second fetch to render a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub username: String,
    pub name: String,
}

/// Delivery state of a message. Ordered: a message only ever moves forward
/// (`Sent -> Delivered -> Read`), never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            _ => None,
        }
    }
}

/// One item of the heterogeneous content corpus. Each variant owns its
/// native fields; the accessors below are the only surface the scoring
/// engine touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Post(Post),
    Product(Product),
    Event(Event),
    Story(Story),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author: Author,
    pub content: String,
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
    pub liked_by_viewer: bool,
    pub commented_by_viewer: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub author: Author,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub condition: String,
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
    pub liked_by_viewer: bool,
    pub commented_by_viewer: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub author: Author,
    pub event_title: String,
    pub event_details: String,
    pub event_date: DateTime<Utc>,
    pub event_location: String,
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
    /// How many users marked themselves interested.
    pub interested: u32,
    pub liked_by_viewer: bool,
    pub commented_by_viewer: bool,
    pub viewer_interested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: Uuid,
    pub author: Author,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn id(&self) -> Uuid {
        match self {
            ContentItem::Post(p) => p.id,
            ContentItem::Product(p) => p.id,
            ContentItem::Event(e) => e.id,
            ContentItem::Story(s) => s.id,
        }
    }

    pub fn author(&self) -> &Author {
        match self {
            ContentItem::Post(p) => &p.author,
            ContentItem::Product(p) => &p.author,
            ContentItem::Event(e) => &e.author,
            ContentItem::Story(s) => &s.author,
        }
    }

    pub fn author_id(&self) -> Uuid {
        self.author().id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ContentItem::Post(p) => p.created_at,
            ContentItem::Product(p) => p.created_at,
            ContentItem::Event(e) => e.created_at,
            ContentItem::Story(s) => s.created_at,
        }
    }

    /// Weighted engagement: likes*2 + comments*3 + shares*5, plus
    /// interested*4 for events. Stories carry no counters.
    pub fn engagement_score(&self) -> u32 {
        match self {
            ContentItem::Post(p) => p.likes * 2 + p.comments * 3 + p.shares * 5,
            ContentItem::Product(p) => p.likes * 2 + p.comments * 3 + p.shares * 5,
            ContentItem::Event(e) => {
                e.likes * 2 + e.comments * 3 + e.shares * 5 + e.interested * 4
            }
            ContentItem::Story(_) => 0,
        }
    }

    /// The text an interest token is matched against. Does not include the
    /// author's username; callers append it where the contract wants it.
    pub fn text_for_matching(&self) -> String {
        match self {
            ContentItem::Post(p) => p.content.clone(),
            ContentItem::Product(p) => format!("{} {}", p.title, p.description),
            ContentItem::Event(e) => format!("{} {}", e.event_title, e.event_details),
            ContentItem::Story(s) => s.text.clone(),
        }
    }

    pub fn is_story(&self) -> bool {
        matches!(self, ContentItem::Story(_))
    }

    /// Has the viewer liked, commented on, or (for events) marked interest
    /// in this item? Used to boost unexplored suggestions.
    pub fn viewer_has_interacted(&self) -> bool {
        match self {
            ContentItem::Post(p) => p.liked_by_viewer || p.commented_by_viewer,
            ContentItem::Product(p) => p.liked_by_viewer || p.commented_by_viewer,
            ContentItem::Event(e) => {
                e.liked_by_viewer || e.commented_by_viewer || e.viewer_interested
            }
            ContentItem::Story(_) => false,
        }
    }

    /// Is this an event the viewer marked interest in?
    pub fn viewer_interested(&self) -> bool {
        matches!(self, ContentItem::Event(e) if e.viewer_interested)
    }
}
