use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use piazza_db::Database;
use piazza_types::events::{GatewayCommand, GatewayEvent, conversation_room};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a pre-authenticated WebSocket connection. The bearer token was
/// already validated at the HTTP upgrade, so the connection goes straight
/// into its personal room and the event loop.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    user_id: Uuid,
    username: String,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} ({}) connected to gateway", username, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    let Ok(ready_text) = serde_json::to_string(&ready) else {
        return;
    };
    if sender.send(Message::Text(ready_text.into())).await.is_err() {
        return;
    }

    // Joins the personal room for notification fan-out.
    let (conn_id, mut user_rx) = dispatcher.register(user_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward room events -> client, with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client.
    let dispatcher_recv = dispatcher.clone();
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_recv, &db, conn_id, user_id, &username_recv, cmd)
                            .await;
                    }
                    Err(e) => {
                        let preview: String = text.chars().take(200).collect();
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            username_recv, user_id, e, preview
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(conn_id);
    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn handle_command(
    dispatcher: &Dispatcher,
    db: &Arc<Database>,
    conn_id: Uuid,
    user_id: Uuid,
    username: &str,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::JoinConversation { conversation_id } => {
            let error = match authorize_join(db, conversation_id, user_id).await {
                Ok(()) => None,
                Err(e) => Some(e),
            };

            let room = conversation_room(conversation_id);
            if error.is_none() {
                info!("{} ({}) joined {}", username, user_id, room);
                dispatcher.join_room(conn_id, &room);
            } else {
                warn!(
                    "{} ({}) refused join to {}: {:?}",
                    username, user_id, room, error
                );
            }

            // A refused join always answers with an explicit error payload.
            dispatcher.send_to_conn(
                conn_id,
                GatewayEvent::JoinAck {
                    conversation_id,
                    success: error.is_none(),
                    error,
                },
            );
        }

        GatewayCommand::LeaveConversation { conversation_id } => {
            let room = conversation_room(conversation_id);
            info!("{} ({}) left {}", username, user_id, room);
            dispatcher.leave_room(conn_id, &room);
        }
    }
}

/// Server-side membership check against the conversation store before a
/// room join is honored.
async fn authorize_join(
    db: &Arc<Database>,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<(), String> {
    let db = db.clone();
    let result = tokio::task::spawn_blocking(move || {
        db.get_conversation(&conversation_id.to_string())
    })
    .await;

    let conversation = match result {
        Ok(Ok(row)) => row,
        Ok(Err(e)) => {
            warn!("Conversation lookup failed: {}", e);
            return Err("Failed to join conversation".to_string());
        }
        Err(e) => {
            warn!("spawn_blocking join error: {}", e);
            return Err("Failed to join conversation".to_string());
        }
    };

    let Some(conversation) = conversation else {
        return Err("Conversation not found".to_string());
    };

    let uid = user_id.to_string();
    if conversation.participant_a != uid && conversation.participant_b != uid {
        return Err("Not authorized to join this conversation".to_string());
    }

    Ok(())
}
