use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{MessageResponse, Reaction};
use crate::models::MessageStatus;

/// Room naming scheme: every connection sits in its owner's personal room;
/// conversation rooms are joined on demand after an authorization check.
pub fn user_room(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

pub fn conversation_room(conversation_id: Uuid) -> String {
    format!("conversation:{conversation_id}")
}

/// Events sent over the WebSocket gateway. Payloads carry enough
/// denormalized data for clients to update without a refetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A new message was posted to a conversation the client has joined
    #[serde(rename_all = "camelCase")]
    ReceiveMessage {
        conversation_id: Uuid,
        message: MessageResponse,
    },

    /// Messages in a conversation were bulk-transitioned by a reader
    #[serde(rename_all = "camelCase")]
    MessageStatusUpdated {
        conversation_id: Uuid,
        reader_id: Uuid,
        status: MessageStatus,
    },

    /// A message was soft-hidden for one viewer
    #[serde(rename_all = "camelCase")]
    MessageDeleted {
        conversation_id: Uuid,
        message_id: Uuid,
        deleted_for: Vec<Uuid>,
    },

    /// The reaction set of a message changed
    #[serde(rename_all = "camelCase")]
    MessageReactionUpdated {
        conversation_id: Uuid,
        message_id: Uuid,
        reactions: Vec<Reaction>,
    },

    /// The pinned message of a conversation changed
    #[serde(rename_all = "camelCase")]
    MessagePinnedUpdated {
        conversation_id: Uuid,
        message_id: Uuid,
        pinned_by: Vec<Uuid>,
    },

    /// Reply to a join_conversation command. `error` is set when the join
    /// was refused; a refused join is never a silent no-op.
    #[serde(rename_all = "camelCase")]
    JoinAck {
        conversation_id: Uuid,
        success: bool,
        error: Option<String>,
    },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Join a conversation room (server verifies membership first)
    #[serde(rename_all = "camelCase")]
    JoinConversation { conversation_id: Uuid },

    /// Leave a conversation room
    #[serde(rename_all = "camelCase")]
    LeaveConversation { conversation_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_tags_match_client_contract() {
        let event = GatewayEvent::MessageStatusUpdated {
            conversation_id: Uuid::nil(),
            reader_id: Uuid::nil(),
            status: MessageStatus::Read,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_status_updated");
        assert_eq!(json["data"]["status"], "read");
    }

    #[test]
    fn join_command_round_trips() {
        let id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"join_conversation","data":{{"conversationId":"{id}"}}}}"#
        );
        match serde_json::from_str::<GatewayCommand>(&raw).unwrap() {
            GatewayCommand::JoinConversation { conversation_id } => {
                assert_eq!(conversation_id, id)
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
