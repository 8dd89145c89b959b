use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use piazza_db::Database;
use piazza_db::models::ConversationRow;
use piazza_gateway::Broadcaster;
use piazza_types::api::{
    Claims, ConversationResponse, CreateConversationRequest, MessageResponse, Reaction,
    ReactRequest, SendMessageRequest,
};
use piazza_types::events::{GatewayEvent, conversation_room};
use piazza_types::models::{Author, MessageStatus};

use crate::convert::{self, parse_id, parse_ts};
use crate::error::ApiError;
use crate::state::AppState;

const MAX_EMOJI_CHARS: usize = 5;

fn is_participant(row: &ConversationRow, user_id: &str) -> bool {
    row.participant_a == user_id || row.participant_b == user_id
}

fn other_participant<'a>(row: &'a ConversationRow, user_id: &str) -> &'a str {
    if row.participant_a == user_id {
        &row.participant_b
    } else {
        &row.participant_a
    }
}

/// Initial (status, is_read) of a new message. Automated replies are born
/// read. Human messages start as delivered when the recipient is watching
/// the conversation room, sent otherwise.
fn initial_status(
    broadcaster: &dyn Broadcaster,
    conv: &ConversationRow,
    sender_id: &str,
    is_ai: bool,
) -> (MessageStatus, bool) {
    if is_ai {
        return (MessageStatus::Read, true);
    }
    let recipient = parse_id(other_participant(conv, sender_id), "conversation");
    let room = conversation_room(parse_id(&conv.id, "conversation"));
    if broadcaster.room_has_user(&room, recipient) {
        (MessageStatus::Delivered, false)
    } else {
        (MessageStatus::Sent, false)
    }
}

fn participant_authors(db: &Database, row: &ConversationRow) -> anyhow::Result<Vec<Author>> {
    let mut out = Vec::with_capacity(2);
    for id in [&row.participant_a, &row.participant_b] {
        if let Some(user) = db.get_user_by_id(id)? {
            out.push(Author {
                id: parse_id(&user.id, "user"),
                username: user.username,
                name: user.name,
            });
        }
    }
    Ok(out)
}

fn conversation_response(
    db: &Database,
    row: ConversationRow,
    viewer_id: &str,
) -> anyhow::Result<ConversationResponse> {
    let participants = participant_authors(db, &row)?;
    let last_message = match db.last_message(&row.id)? {
        Some(m) => {
            let reactions = db.reactions_for_message(&m.id)?;
            Some(convert::message_response(m, &reactions))
        }
        None => None,
    };
    let unread_count = db.unread_count(&row.id, viewer_id)?;

    Ok(ConversationResponse {
        id: parse_id(&row.id, "conversation"),
        participants,
        created_at: parse_ts(&row.created_at, "conversation"),
        updated_at: parse_ts(&row.updated_at, "conversation"),
        last_message,
        unread_count,
    })
}

/// `POST /api/messages`
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let raw_conversation = req
        .conversation_id
        .as_deref()
        .ok_or_else(|| ApiError::Validation("Conversation ID is required".into()))?;
    let conversation_id: Uuid = raw_conversation
        .parse()
        .map_err(|_| ApiError::Validation("Invalid conversation ID".into()))?;
    let content = req
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Message content is required".into()))?
        .to_string();

    let product_json = req
        .product
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(anyhow::Error::from)?;
    let event_json = req
        .event
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(anyhow::Error::from)?;

    let db = state.db.clone();
    let broadcaster = state.broadcaster.clone();
    let sender_id = claims.sub.to_string();
    let is_ai = req.is_ai_response;

    let message = tokio::task::spawn_blocking(move || -> Result<MessageResponse, ApiError> {
        let conv = db
            .get_conversation(&conversation_id.to_string())?
            .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))?;

        if !is_ai && !is_participant(&conv, &sender_id) {
            return Err(ApiError::Forbidden(
                "Not a participant of this conversation".into(),
            ));
        }

        let (status, is_read) = initial_status(broadcaster.as_ref(), &conv, &sender_id, is_ai);

        let message_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        db.insert_message(
            &message_id,
            &conv.id,
            &sender_id,
            &content,
            product_json.as_deref(),
            event_json.as_deref(),
            is_ai,
            is_read,
            status.as_str(),
            &now,
        )?;
        db.touch_conversation(&conv.id, &now)?;

        let row = db
            .get_message(&message_id)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("message vanished after insert")))?;
        Ok(convert::message_response(row, &[]))
    })
    .await
    .map_err(ApiError::join)??;

    state.broadcaster.emit_to_room(
        &conversation_room(conversation_id),
        GatewayEvent::ReceiveMessage {
            conversation_id,
            message: message.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(message)))
}

/// `GET /api/messages/conversation/{id}`
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let viewer_id = claims.sub.to_string();

    let messages = tokio::task::spawn_blocking(move || -> Result<Vec<MessageResponse>, ApiError> {
        let conv = db
            .get_conversation(&conversation_id.to_string())?
            .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))?;
        if !is_participant(&conv, &viewer_id) {
            return Err(ApiError::Forbidden(
                "Not a participant of this conversation".into(),
            ));
        }

        let rows = db.list_messages(&conv.id, &viewer_id)?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let reactions = db.reactions_for_messages(&ids)?;
        Ok(rows
            .into_iter()
            .map(|row| convert::message_response(row, &reactions))
            .collect())
    })
    .await
    .map_err(ApiError::join)??;

    Ok(Json(messages))
}

/// `POST /api/messages/conversation`
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let raw_receiver = req
        .receiver_id
        .as_deref()
        .ok_or_else(|| ApiError::Validation("Receiver ID is required".into()))?;
    let receiver_id: Uuid = raw_receiver
        .parse()
        .map_err(|_| ApiError::Validation("Invalid receiver ID".into()))?;
    if receiver_id == claims.sub {
        return Err(ApiError::Validation(
            "Cannot start a conversation with yourself".into(),
        ));
    }

    let db = state.db.clone();
    let caller_id = claims.sub.to_string();

    let conversation =
        tokio::task::spawn_blocking(move || -> Result<ConversationResponse, ApiError> {
            if !db.user_exists(&receiver_id.to_string())? {
                return Err(ApiError::NotFound("User not found".into()));
            }

            let candidate = Uuid::new_v4().to_string();
            let now = Utc::now().to_rfc3339();
            let (row, _created) = db.find_or_create_conversation(
                &candidate,
                &caller_id,
                &receiver_id.to_string(),
                &now,
            )?;
            Ok(conversation_response(&db, row, &caller_id)?)
        })
        .await
        .map_err(ApiError::join)??;

    Ok((StatusCode::CREATED, Json(conversation)))
}

/// `GET /api/messages/conversations`
pub async fn get_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let caller_id = claims.sub.to_string();

    let conversations =
        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<ConversationResponse>> {
            db.list_conversations_for(&caller_id)?
                .into_iter()
                .map(|row| conversation_response(&db, row, &caller_id))
                .collect()
        })
        .await
        .map_err(ApiError::join)??;

    Ok(Json(conversations))
}

/// `POST /api/messages/conversation/{id}/read`
pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let reader_id = claims.sub.to_string();

    let updated = tokio::task::spawn_blocking(move || -> Result<usize, ApiError> {
        let conv = db
            .get_conversation(&conversation_id.to_string())?
            .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))?;
        if !is_participant(&conv, &reader_id) {
            return Err(ApiError::Forbidden(
                "Not a participant of this conversation".into(),
            ));
        }
        Ok(db.mark_read(&conv.id, &reader_id)?)
    })
    .await
    .map_err(ApiError::join)??;

    if updated > 0 {
        state.broadcaster.emit_to_room(
            &conversation_room(conversation_id),
            GatewayEvent::MessageStatusUpdated {
                conversation_id,
                reader_id: claims.sub,
                status: MessageStatus::Read,
            },
        );
    }

    Ok(Json(json!({ "updated": updated, "unreadCount": 0 })))
}

/// `POST /api/messages/message/{id}/delete`
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let caller_id = claims.sub.to_string();

    let (conversation_id, deleted_for) =
        tokio::task::spawn_blocking(move || -> Result<(Uuid, Vec<Uuid>), ApiError> {
            let row = db
                .get_message(&message_id.to_string())?
                .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;
            let conv = db
                .get_conversation(&row.conversation_id)?
                .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))?;
            if !is_participant(&conv, &caller_id) {
                return Err(ApiError::Forbidden(
                    "Not a participant of this conversation".into(),
                ));
            }

            db.add_deleted_for(&row.id, &caller_id, &Utc::now().to_rfc3339())?;
            let deleted_for = db
                .deleted_for(&row.id)?
                .iter()
                .map(|id| parse_id(id, "message"))
                .collect();
            Ok((parse_id(&conv.id, "conversation"), deleted_for))
        })
        .await
        .map_err(ApiError::join)??;

    state.broadcaster.emit_to_room(
        &conversation_room(conversation_id),
        GatewayEvent::MessageDeleted {
            conversation_id,
            message_id,
            deleted_for: deleted_for.clone(),
        },
    );

    Ok(Json(json!({ "deletedFor": deleted_for })))
}

/// `POST /api/messages/message/{id}/react`
pub async fn react_to_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let emoji = req.emoji.trim().to_string();
    if emoji.is_empty() {
        return Err(ApiError::Validation("Emoji is required".into()));
    }
    if emoji.chars().count() > MAX_EMOJI_CHARS {
        return Err(ApiError::Validation(
            "Emoji must be at most 5 characters".into(),
        ));
    }

    let db = state.db.clone();
    let caller_id = claims.sub.to_string();

    let (conversation_id, reactions) =
        tokio::task::spawn_blocking(move || -> Result<(Uuid, Vec<Reaction>), ApiError> {
            let row = db
                .get_message(&message_id.to_string())?
                .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;
            let conv = db
                .get_conversation(&row.conversation_id)?
                .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))?;
            if !is_participant(&conv, &caller_id) {
                return Err(ApiError::Forbidden(
                    "Not a participant of this conversation".into(),
                ));
            }

            db.toggle_reaction(&row.id, &caller_id, &emoji, &Utc::now().to_rfc3339())?;
            let reactions = db
                .reactions_for_message(&row.id)?
                .iter()
                .map(|r| Reaction {
                    user_id: parse_id(&r.user_id, "reaction"),
                    emoji: r.emoji.clone(),
                })
                .collect();
            Ok((parse_id(&conv.id, "conversation"), reactions))
        })
        .await
        .map_err(ApiError::join)??;

    state.broadcaster.emit_to_room(
        &conversation_room(conversation_id),
        GatewayEvent::MessageReactionUpdated {
            conversation_id,
            message_id,
            reactions: reactions.clone(),
        },
    );

    Ok(Json(json!({ "reactions": reactions })))
}

/// `POST /api/messages/message/{id}/pin`
pub async fn pin_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let caller_id = claims.sub.to_string();

    let (conversation_id, pinned_by) =
        tokio::task::spawn_blocking(move || -> Result<(Uuid, Vec<Uuid>), ApiError> {
            let row = db
                .get_message(&message_id.to_string())?
                .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;
            let conv = db
                .get_conversation(&row.conversation_id)?
                .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))?;
            if !is_participant(&conv, &caller_id) {
                return Err(ApiError::Forbidden(
                    "Not a participant of this conversation".into(),
                ));
            }

            let new_pin = db.toggle_pin(&conv.id, &row.id, &caller_id)?;
            let pinned_by = new_pin.map(|id| vec![parse_id(&id, "pin")]).unwrap_or_default();
            Ok((parse_id(&conv.id, "conversation"), pinned_by))
        })
        .await
        .map_err(ApiError::join)??;

    state.broadcaster.emit_to_room(
        &conversation_room(conversation_id),
        GatewayEvent::MessagePinnedUpdated {
            conversation_id,
            message_id,
            pinned_by: pinned_by.clone(),
        },
    );

    Ok(Json(json!({ "pinnedBy": pinned_by })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use piazza_gateway::Dispatcher;

    fn conversation(id: Uuid, a: Uuid, b: Uuid) -> ConversationRow {
        ConversationRow {
            id: id.to_string(),
            participant_a: a.to_string(),
            participant_b: b.to_string(),
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn message_starts_sent_when_recipient_is_not_in_the_room() {
        let (conv_id, alice, bob) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let conv = conversation(conv_id, alice, bob);
        let dispatcher = Dispatcher::new();

        // Bob is connected but has not joined the conversation room.
        let (_conn, _rx) = dispatcher.register(bob);

        let (status, is_read) = initial_status(&dispatcher, &conv, &alice.to_string(), false);
        assert_eq!(status, MessageStatus::Sent);
        assert!(!is_read);
    }

    #[test]
    fn message_starts_delivered_when_recipient_watches_the_room() {
        let (conv_id, alice, bob) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let conv = conversation(conv_id, alice, bob);
        let dispatcher = Dispatcher::new();

        let (conn, _rx) = dispatcher.register(bob);
        dispatcher.join_room(conn, &conversation_room(conv_id));

        let (status, is_read) = initial_status(&dispatcher, &conv, &alice.to_string(), false);
        assert_eq!(status, MessageStatus::Delivered);
        assert!(!is_read);
    }

    #[test]
    fn automated_replies_are_born_read_without_a_presence_lookup() {
        let (conv_id, alice, bob) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let conv = conversation(conv_id, alice, bob);
        let dispatcher = Dispatcher::new();

        // The sender is not a participant at all; the flag still applies.
        let outsider = Uuid::new_v4();
        let (status, is_read) = initial_status(&dispatcher, &conv, &outsider.to_string(), true);
        assert_eq!(status, MessageStatus::Read);
        assert!(is_read);
    }
}
