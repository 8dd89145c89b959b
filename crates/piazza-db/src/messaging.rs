use crate::models::{ConversationRow, MessageRow, ReactionRow};
use crate::{Database, OptionalExt};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode};

const MESSAGE_COLUMNS: &str =
    "m.id, m.conversation_id, m.sender_id, u.username, u.name, m.content,
     m.product_json, m.event_json, m.is_ai_response, m.is_read, m.status,
     m.pinned_by, m.created_at";

impl Database {
    // -- Conversations --

    /// Look up the conversation for an unordered participant pair, creating
    /// it when absent. Participants are stored sorted, so either argument
    /// order resolves to the same row. Returns (row, created).
    ///
    /// Two near-simultaneous creates race on the lookup; the UNIQUE
    /// constraint makes the loser's insert fail, and we fall back to
    /// re-reading the winner's row.
    pub fn find_or_create_conversation(
        &self,
        candidate_id: &str,
        user_a: &str,
        user_b: &str,
        now: &str,
    ) -> Result<(ConversationRow, bool)> {
        let (lo, hi) = sorted_pair(user_a, user_b);

        self.with_conn_mut(|conn| {
            if let Some(row) = query_conversation_by_pair(conn, lo, hi)? {
                return Ok((row, false));
            }

            let inserted = conn.execute(
                "INSERT INTO conversations (id, participant_a, participant_b, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                (candidate_id, lo, hi, now),
            );

            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    // Lost the create race; the pair now exists.
                }
                Err(e) => return Err(e.into()),
            }

            let row = query_conversation_by_pair(conn, lo, hi)?
                .ok_or_else(|| anyhow::anyhow!("conversation vanished after insert"))?;
            let created = row.id == candidate_id;
            Ok((row, created))
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, participant_a, participant_b, created_at, updated_at
                     FROM conversations WHERE id = ?1",
                    [id],
                    conversation_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_conversations_for(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, participant_a, participant_b, created_at, updated_at
                 FROM conversations
                 WHERE participant_a = ?1 OR participant_b = ?1
                 ORDER BY updated_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], conversation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn touch_conversation(&self, id: &str, now: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
                (id, now),
            )?;
            Ok(())
        })
    }

    // -- Messages --

    #[allow(clippy::too_many_arguments)]
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        product_json: Option<&str>,
        event_json: Option<&str>,
        is_ai_response: bool,
        is_read: bool,
        status: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (id, conversation_id, sender_id, content, product_json, event_json,
                     is_ai_response, is_read, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                (
                    id,
                    conversation_id,
                    sender_id,
                    content,
                    product_json,
                    event_json,
                    is_ai_response,
                    is_read,
                    status,
                    now,
                ),
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {MESSAGE_COLUMNS}
                         FROM messages m JOIN users u ON m.sender_id = u.id
                         WHERE m.id = ?1"
                    ),
                    [id],
                    message_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Messages of a conversation in chronological order, excluding the
    /// ones the viewer soft-deleted.
    pub fn list_messages(&self, conversation_id: &str, viewer_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m JOIN users u ON m.sender_id = u.id
                 WHERE m.conversation_id = ?1
                   AND NOT EXISTS(SELECT 1 FROM message_deleted_for d
                                   WHERE d.message_id = m.id AND d.user_id = ?2)
                 ORDER BY m.created_at ASC"
            ))?;
            let rows = stmt
                .query_map([conversation_id, viewer_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn last_message(&self, conversation_id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {MESSAGE_COLUMNS}
                         FROM messages m JOIN users u ON m.sender_id = u.id
                         WHERE m.conversation_id = ?1
                         ORDER BY m.created_at DESC
                         LIMIT 1"
                    ),
                    [conversation_id],
                    message_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Unread messages for one participant. Automated messages never count.
    pub fn unread_count(&self, conversation_id: &str, viewer_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE conversation_id = ?1 AND sender_id != ?2
                   AND is_read = 0 AND is_ai_response = 0",
                [conversation_id, viewer_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Bulk `status -> read` transition for everything the reader has not
    /// sent. Idempotent: already-read rows are untouched. Returns the number
    /// of rows transitioned.
    pub fn mark_read(&self, conversation_id: &str, reader_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET status = 'read', is_read = 1
                 WHERE conversation_id = ?1 AND sender_id != ?2
                   AND status != 'read' AND is_ai_response = 0",
                [conversation_id, reader_id],
            )?;
            Ok(updated)
        })
    }

    // -- Soft delete --

    pub fn add_deleted_for(&self, message_id: &str, user_id: &str, now: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO message_deleted_for (message_id, user_id, created_at)
                 VALUES (?1, ?2, ?3)",
                (message_id, user_id, now),
            )?;
            Ok(())
        })
    }

    pub fn deleted_for(&self, message_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_id FROM message_deleted_for WHERE message_id = ?1")?;
            let rows = stmt
                .query_map([message_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Reactions --

    /// Toggle a reaction: removes if exists, inserts if not.
    /// Returns true when the reaction was added.
    pub fn toggle_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
        now: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM message_reactions
                 WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                (message_id, user_id, emoji),
            )?;
            if removed > 0 {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO message_reactions (message_id, user_id, emoji, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (message_id, user_id, emoji, now),
            )?;
            Ok(true)
        })
    }

    pub fn reactions_for_message(&self, message_id: &str) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT message_id, user_id, emoji FROM message_reactions
                 WHERE message_id = ?1",
            )?;
            let rows = stmt
                .query_map([message_id], reaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch reactions for a set of message IDs.
    pub fn reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT message_id, user_id, emoji FROM message_reactions
                 WHERE message_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), reaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Pins --

    /// Toggle the caller's pin on a message, keeping at most one pinned
    /// message per conversation: pinning clears every other pin first.
    /// Returns the message's new pinning user, if any.
    pub fn toggle_pin(
        &self,
        conversation_id: &str,
        message_id: &str,
        user_id: &str,
    ) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let current: Option<String> = tx.query_row(
                "SELECT pinned_by FROM messages WHERE id = ?1",
                [message_id],
                |row| row.get(0),
            )?;

            let new_pin = if current.as_deref() == Some(user_id) {
                tx.execute("UPDATE messages SET pinned_by = NULL WHERE id = ?1", [message_id])?;
                None
            } else {
                tx.execute(
                    "UPDATE messages SET pinned_by = NULL
                     WHERE conversation_id = ?1 AND pinned_by IS NOT NULL",
                    [conversation_id],
                )?;
                tx.execute(
                    "UPDATE messages SET pinned_by = ?2 WHERE id = ?1",
                    [message_id, user_id],
                )?;
                Some(user_id.to_string())
            };

            tx.commit()?;
            Ok(new_pin)
        })
    }
}

fn sorted_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

fn query_conversation_by_pair(
    conn: &Connection,
    lo: &str,
    hi: &str,
) -> Result<Option<ConversationRow>> {
    conn.query_row(
        "SELECT id, participant_a, participant_b, created_at, updated_at
         FROM conversations WHERE participant_a = ?1 AND participant_b = ?2",
        [lo, hi],
        conversation_from_row,
    )
    .optional()
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_a: row.get(1)?,
        participant_b: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row.get(3)?,
        sender_name: row.get(4)?,
        content: row.get(5)?,
        product_json: row.get(6)?,
        event_json: row.get(7)?,
        is_ai_response: row.get(8)?,
        is_read: row.get(9)?,
        status: row.get(10)?,
        pinned_by: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn reaction_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        message_id: row.get(0)?,
        user_id: row.get(1)?,
        emoji: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "alice", "hash", "Alice", "2026-01-01T00:00:00Z").unwrap();
        db.create_user("u2", "bob", "hash", "Bob", "2026-01-01T00:00:00Z").unwrap();
        db
    }

    fn seed_conversation(db: &Database) -> String {
        let (conv, created) = db
            .find_or_create_conversation("c1", "u1", "u2", "2026-01-01T00:00:00Z")
            .unwrap();
        assert!(created);
        conv.id
    }

    fn send(db: &Database, id: &str, conv: &str, sender: &str, at: &str) {
        db.insert_message(id, conv, sender, "hi", None, None, false, false, "sent", at)
            .unwrap();
    }

    #[test]
    fn conversation_pair_is_unordered() {
        let db = test_db();
        let id = seed_conversation(&db);

        // Reversed argument order finds the same conversation.
        let (conv, created) = db
            .find_or_create_conversation("c-other", "u2", "u1", "2026-01-02T00:00:00Z")
            .unwrap();
        assert!(!created);
        assert_eq!(conv.id, id);
    }

    #[test]
    fn reaction_toggle_is_self_inverse() {
        let db = test_db();
        let conv = seed_conversation(&db);
        send(&db, "m1", &conv, "u1", "2026-01-01T01:00:00Z");

        assert!(db.toggle_reaction("m1", "u2", "👍", "2026-01-01T02:00:00Z").unwrap());
        assert_eq!(db.reactions_for_message("m1").unwrap().len(), 1);

        assert!(!db.toggle_reaction("m1", "u2", "👍", "2026-01-01T03:00:00Z").unwrap());
        assert!(db.reactions_for_message("m1").unwrap().is_empty());
    }

    #[test]
    fn distinct_emojis_coexist_for_one_user() {
        let db = test_db();
        let conv = seed_conversation(&db);
        send(&db, "m1", &conv, "u1", "2026-01-01T01:00:00Z");

        db.toggle_reaction("m1", "u2", "👍", "2026-01-01T02:00:00Z").unwrap();
        db.toggle_reaction("m1", "u2", "🎉", "2026-01-01T02:01:00Z").unwrap();
        assert_eq!(db.reactions_for_message("m1").unwrap().len(), 2);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let db = test_db();
        let conv = seed_conversation(&db);
        send(&db, "m1", &conv, "u1", "2026-01-01T01:00:00Z");
        send(&db, "m2", &conv, "u1", "2026-01-01T02:00:00Z");

        assert_eq!(db.unread_count(&conv, "u2").unwrap(), 2);
        assert_eq!(db.mark_read(&conv, "u2").unwrap(), 2);
        assert_eq!(db.unread_count(&conv, "u2").unwrap(), 0);

        // Second call transitions nothing and the count stays zero.
        assert_eq!(db.mark_read(&conv, "u2").unwrap(), 0);
        assert_eq!(db.unread_count(&conv, "u2").unwrap(), 0);
    }

    #[test]
    fn mark_read_skips_own_and_automated_messages() {
        let db = test_db();
        let conv = seed_conversation(&db);
        send(&db, "m1", &conv, "u2", "2026-01-01T01:00:00Z");
        db.insert_message(
            "m2", &conv, "u1", "auto", None, None, true, true, "read",
            "2026-01-01T02:00:00Z",
        )
        .unwrap();

        assert_eq!(db.mark_read(&conv, "u2").unwrap(), 0);
    }

    #[test]
    fn soft_delete_hides_only_for_the_deleter() {
        let db = test_db();
        let conv = seed_conversation(&db);
        send(&db, "m1", &conv, "u1", "2026-01-01T01:00:00Z");
        send(&db, "m2", &conv, "u1", "2026-01-01T02:00:00Z");

        db.add_deleted_for("m1", "u2", "2026-01-01T03:00:00Z").unwrap();
        // Idempotent.
        db.add_deleted_for("m1", "u2", "2026-01-01T04:00:00Z").unwrap();

        assert_eq!(db.list_messages(&conv, "u2").unwrap().len(), 1);
        assert_eq!(db.list_messages(&conv, "u1").unwrap().len(), 2);
        // The row is still there for everyone else.
        assert!(db.get_message("m1").unwrap().is_some());
    }

    #[test]
    fn at_most_one_pin_per_conversation() {
        let db = test_db();
        let conv = seed_conversation(&db);
        send(&db, "m1", &conv, "u1", "2026-01-01T01:00:00Z");
        send(&db, "m2", &conv, "u2", "2026-01-01T02:00:00Z");

        assert_eq!(db.toggle_pin(&conv, "m1", "u1").unwrap(), Some("u1".into()));
        assert_eq!(db.toggle_pin(&conv, "m2", "u1").unwrap(), Some("u1".into()));

        // Pinning m2 cleared m1's pin.
        assert_eq!(db.get_message("m1").unwrap().unwrap().pinned_by, None);
        assert_eq!(
            db.get_message("m2").unwrap().unwrap().pinned_by,
            Some("u1".into())
        );

        // Toggling again unpins.
        assert_eq!(db.toggle_pin(&conv, "m2", "u1").unwrap(), None);
        assert_eq!(db.get_message("m2").unwrap().unwrap().pinned_by, None);
    }

    #[test]
    fn conversations_sorted_by_latest_activity() {
        let db = test_db();
        db.create_user("u3", "carol", "hash", "Carol", "2026-01-01T00:00:00Z").unwrap();
        let (c1, _) = db
            .find_or_create_conversation("c1", "u1", "u2", "2026-01-01T00:00:00Z")
            .unwrap();
        let (c2, _) = db
            .find_or_create_conversation("c2", "u1", "u3", "2026-01-02T00:00:00Z")
            .unwrap();

        db.touch_conversation(&c1.id, "2026-01-03T00:00:00Z").unwrap();

        let listed = db.list_conversations_for("u1").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, c1.id);
        assert_eq!(listed[1].id, c2.id);
    }
}
