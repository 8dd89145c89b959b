use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use piazza_types::events::{GatewayEvent, user_room};

/// Capability handed to the messaging service for realtime fan-out.
/// Emission is fire-and-forget: a room with no members, or a member whose
/// channel is gone, is not an error.
pub trait Broadcaster: Send + Sync {
    /// Deliver an event to every connection currently in `room`.
    fn emit_to_room(&self, room: &str, event: GatewayEvent);

    /// Whether `user_id` has at least one live connection in `room`.
    /// This is the presence approximation used to pick initial message
    /// status: membership of the room, nothing stronger.
    fn room_has_user(&self, room: &str, user_id: Uuid) -> bool;
}

struct ConnectionHandle {
    user_id: Uuid,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

struct ConnectionState {
    user_id: Uuid,
    rooms: HashSet<String>,
}

/// Manages all connected clients and their room memberships.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// room name -> (conn_id -> handle)
    rooms: RwLock<HashMap<String, HashMap<Uuid, ConnectionHandle>>>,
    /// conn_id -> connection state (owner + joined rooms)
    connections: RwLock<HashMap<Uuid, ConnectionState>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                rooms: RwLock::new(HashMap::new()),
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new connection for `user_id`. The connection is placed in
    /// the user's personal room immediately. Returns (conn_id, receiver).
    pub fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner
            .connections
            .write()
            .expect("connection lock poisoned")
            .insert(
                conn_id,
                ConnectionState {
                    user_id,
                    rooms: HashSet::new(),
                },
            );

        self.join_with_sender(conn_id, user_id, tx, &user_room(user_id));
        (conn_id, rx)
    }

    /// Remove a connection from every room it joined.
    pub fn unregister(&self, conn_id: Uuid) {
        let state = self
            .inner
            .connections
            .write()
            .expect("connection lock poisoned")
            .remove(&conn_id);

        let Some(state) = state else { return };

        let mut rooms = self.inner.rooms.write().expect("room lock poisoned");
        for room in &state.rooms {
            if let Some(members) = rooms.get_mut(room) {
                members.remove(&conn_id);
                if members.is_empty() {
                    rooms.remove(room);
                }
            }
        }
    }

    /// Add a connection to a room. Membership authorization is the caller's
    /// responsibility; the dispatcher only tracks who is where.
    pub fn join_room(&self, conn_id: Uuid, room: &str) {
        let (user_id, tx) = {
            let connections = self.inner.connections.read().expect("connection lock poisoned");
            let Some(state) = connections.get(&conn_id) else { return };
            let rooms = self.inner.rooms.read().expect("room lock poisoned");
            let Some(handle) = rooms
                .get(&user_room(state.user_id))
                .and_then(|members| members.get(&conn_id))
            else {
                return;
            };
            (state.user_id, handle.tx.clone())
        };

        self.join_with_sender(conn_id, user_id, tx, room);
    }

    pub fn leave_room(&self, conn_id: Uuid, room: &str) {
        {
            let mut rooms = self.inner.rooms.write().expect("room lock poisoned");
            if let Some(members) = rooms.get_mut(room) {
                members.remove(&conn_id);
                if members.is_empty() {
                    rooms.remove(room);
                }
            }
        }
        let mut connections = self.inner.connections.write().expect("connection lock poisoned");
        if let Some(state) = connections.get_mut(&conn_id) {
            state.rooms.remove(room);
        }
    }

    /// Send an event to one specific connection.
    pub fn send_to_conn(&self, conn_id: Uuid, event: GatewayEvent) {
        let connections = self.inner.connections.read().expect("connection lock poisoned");
        let Some(state) = connections.get(&conn_id) else { return };
        let rooms = self.inner.rooms.read().expect("room lock poisoned");
        if let Some(handle) = rooms
            .get(&user_room(state.user_id))
            .and_then(|members| members.get(&conn_id))
        {
            let _ = handle.tx.send(event);
        }
    }

    fn join_with_sender(
        &self,
        conn_id: Uuid,
        user_id: Uuid,
        tx: mpsc::UnboundedSender<GatewayEvent>,
        room: &str,
    ) {
        self.inner
            .rooms
            .write()
            .expect("room lock poisoned")
            .entry(room.to_string())
            .or_default()
            .insert(conn_id, ConnectionHandle { user_id, tx });

        let mut connections = self.inner.connections.write().expect("connection lock poisoned");
        if let Some(state) = connections.get_mut(&conn_id) {
            state.rooms.insert(room.to_string());
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for Dispatcher {
    fn emit_to_room(&self, room: &str, event: GatewayEvent) {
        let rooms = self.inner.rooms.read().expect("room lock poisoned");
        let Some(members) = rooms.get(room) else {
            debug!("emit to empty room {}", room);
            return;
        };
        for handle in members.values() {
            // A closed receiver means the connection is tearing down;
            // dropping the event is the contract.
            let _ = handle.tx.send(event.clone());
        }
    }

    fn room_has_user(&self, room: &str, user_id: Uuid) -> bool {
        let rooms = self.inner.rooms.read().expect("room lock poisoned");
        rooms
            .get(room)
            .is_some_and(|members| members.values().any(|h| h.user_id == user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use piazza_types::events::conversation_room;

    #[test]
    fn register_joins_the_personal_room() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (_conn, mut rx) = dispatcher.register(user);

        assert!(dispatcher.room_has_user(&user_room(user), user));

        dispatcher.emit_to_room(
            &user_room(user),
            GatewayEvent::Ready {
                user_id: user,
                username: "alice".into(),
            },
        );
        assert!(matches!(rx.try_recv(), Ok(GatewayEvent::Ready { .. })));
    }

    #[test]
    fn room_events_reach_only_members() {
        let dispatcher = Dispatcher::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = Uuid::new_v4();
        let room = conversation_room(conversation);

        let (alice_conn, mut alice_rx) = dispatcher.register(alice);
        let (_bob_conn, mut bob_rx) = dispatcher.register(bob);

        dispatcher.join_room(alice_conn, &room);
        dispatcher.emit_to_room(
            &room,
            GatewayEvent::JoinAck {
                conversation_id: conversation,
                success: true,
                error: None,
            },
        );

        assert!(alice_rx.try_recv().is_ok());
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn presence_follows_room_membership() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let room = conversation_room(Uuid::new_v4());

        let (conn, _rx) = dispatcher.register(user);
        assert!(!dispatcher.room_has_user(&room, user));

        dispatcher.join_room(conn, &room);
        assert!(dispatcher.room_has_user(&room, user));

        dispatcher.leave_room(conn, &room);
        assert!(!dispatcher.room_has_user(&room, user));
    }

    #[test]
    fn unregister_clears_every_membership() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let room = conversation_room(Uuid::new_v4());

        let (conn, _rx) = dispatcher.register(user);
        dispatcher.join_room(conn, &room);
        dispatcher.unregister(conn);

        assert!(!dispatcher.room_has_user(&user_room(user), user));
        assert!(!dispatcher.room_has_user(&room, user));
    }
}
