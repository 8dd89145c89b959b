/// Database row types, mapped directly from SQLite rows.
/// Distinct from piazza-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub name: String,
    pub created_at: String,
}

/// One row of any content listing. Counters and viewer flags are computed
/// in the query so the caller never does N+1 fetches.
pub struct PostRow {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub author_name: String,
    pub content: String,
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
    pub viewer_liked: bool,
    pub viewer_commented: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ProductRow {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub author_name: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub condition: String,
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
    pub viewer_liked: bool,
    pub viewer_commented: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct EventRow {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub author_name: String,
    pub event_title: String,
    pub event_details: String,
    pub event_date: String,
    pub event_location: String,
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
    pub interested: u32,
    pub viewer_liked: bool,
    pub viewer_commented: bool,
    pub viewer_interested: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct StoryRow {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub author_name: String,
    pub text: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub sender_name: String,
    pub content: String,
    pub product_json: Option<String>,
    pub event_json: Option<String>,
    pub is_ai_response: bool,
    pub is_read: bool,
    pub status: String,
    pub pinned_by: Option<String>,
    pub created_at: String,
}

pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
}
