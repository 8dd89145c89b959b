use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            name        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            author_id   TEXT NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            shares      INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id          TEXT PRIMARY KEY,
            author_id   TEXT NOT NULL REFERENCES users(id),
            title       TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            price       REAL NOT NULL,
            category    TEXT NOT NULL DEFAULT '',
            condition   TEXT NOT NULL DEFAULT 'new',
            shares      INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id              TEXT PRIMARY KEY,
            author_id       TEXT NOT NULL REFERENCES users(id),
            event_title     TEXT NOT NULL,
            event_details   TEXT NOT NULL,
            event_date      TEXT NOT NULL,
            event_location  TEXT NOT NULL,
            shares          INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS stories (
            id          TEXT PRIMARY KEY,
            author_id   TEXT NOT NULL REFERENCES users(id),
            text        TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        -- Likes across content types; content_type is one of
        -- 'post' | 'product' | 'event'.
        CREATE TABLE IF NOT EXISTS content_likes (
            content_type TEXT NOT NULL,
            content_id   TEXT NOT NULL,
            user_id      TEXT NOT NULL REFERENCES users(id),
            created_at   TEXT NOT NULL,
            PRIMARY KEY (content_type, content_id, user_id)
        );

        -- Comments form a forest per item via nullable parent_id.
        CREATE TABLE IF NOT EXISTS content_comments (
            id           TEXT PRIMARY KEY,
            content_type TEXT NOT NULL,
            content_id   TEXT NOT NULL,
            user_id      TEXT NOT NULL REFERENCES users(id),
            content      TEXT NOT NULL,
            parent_id    TEXT REFERENCES content_comments(id),
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_content
            ON content_comments(content_type, content_id);

        CREATE TABLE IF NOT EXISTS event_interest (
            event_id    TEXT NOT NULL REFERENCES events(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (event_id, user_id)
        );

        -- Participants are stored sorted (participant_a < participant_b)
        -- so the unordered pair maps to one canonical row; the UNIQUE
        -- constraint closes the find-or-create race at the store.
        CREATE TABLE IF NOT EXISTS conversations (
            id             TEXT PRIMARY KEY,
            participant_a  TEXT NOT NULL REFERENCES users(id),
            participant_b  TEXT NOT NULL REFERENCES users(id),
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL,
            UNIQUE (participant_a, participant_b)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id               TEXT PRIMARY KEY,
            conversation_id  TEXT NOT NULL REFERENCES conversations(id),
            sender_id        TEXT NOT NULL REFERENCES users(id),
            content          TEXT NOT NULL,
            product_json     TEXT,
            event_json       TEXT,
            is_ai_response   INTEGER NOT NULL DEFAULT 0,
            is_read          INTEGER NOT NULL DEFAULT 0,
            status           TEXT NOT NULL DEFAULT 'sent',
            pinned_by        TEXT,
            created_at       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS message_reactions (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id, emoji)
        );

        -- Per-viewer tombstones; the message row itself is never removed.
        CREATE TABLE IF NOT EXISTS message_deleted_for (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
