use crate::models::{EventRow, PostRow, ProductRow, StoryRow, UserRow};
use crate::{Database, OptionalExt};
use anyhow::{Result, bail};
use rusqlite::Connection;
use rusqlite::types::ToSql;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        name: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, username, password_hash, name, now),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Content creation --

    pub fn create_post(&self, id: &str, author_id: &str, content: &str, now: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                (id, author_id, content, now),
            )?;
            Ok(())
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_product(
        &self,
        id: &str,
        author_id: &str,
        title: &str,
        description: &str,
        price: f64,
        category: &str,
        condition: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO products
                    (id, author_id, title, description, price, category, condition,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                (id, author_id, title, description, price, category, condition, now),
            )?;
            Ok(())
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_event(
        &self,
        id: &str,
        author_id: &str,
        title: &str,
        details: &str,
        event_date: &str,
        location: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO events
                    (id, author_id, event_title, event_details, event_date,
                     event_location, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                (id, author_id, title, details, event_date, location, now),
            )?;
            Ok(())
        })
    }

    pub fn create_story(&self, id: &str, author_id: &str, text: &str, now: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO stories (id, author_id, text, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                (id, author_id, text, now),
            )?;
            Ok(())
        })
    }

    // -- Engagement --

    pub fn content_exists(&self, content_type: &str, id: &str) -> Result<bool> {
        let table = match content_type {
            "post" => "posts",
            "product" => "products",
            "event" => "events",
            "story" => "stories",
            other => bail!("unknown content type: {}", other),
        };
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(&format!("SELECT 1 FROM {table} WHERE id = ?1"), [id], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Toggle a like: removes if present, inserts if not.
    /// Returns true when the like was added.
    pub fn toggle_like(
        &self,
        content_type: &str,
        content_id: &str,
        user_id: &str,
        now: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM content_likes
                 WHERE content_type = ?1 AND content_id = ?2 AND user_id = ?3",
                (content_type, content_id, user_id),
            )?;
            if removed > 0 {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO content_likes (content_type, content_id, user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (content_type, content_id, user_id, now),
            )?;
            Ok(true)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_comment(
        &self,
        id: &str,
        content_type: &str,
        content_id: &str,
        user_id: &str,
        content: &str,
        parent_id: Option<&str>,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO content_comments
                    (id, content_type, content_id, user_id, content, parent_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (id, content_type, content_id, user_id, content, parent_id, now),
            )?;
            Ok(())
        })
    }

    /// Toggle event interest. Returns true when interest was added.
    pub fn toggle_interest(&self, event_id: &str, user_id: &str, now: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM event_interest WHERE event_id = ?1 AND user_id = ?2",
                (event_id, user_id),
            )?;
            if removed > 0 {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO event_interest (event_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                (event_id, user_id, now),
            )?;
            Ok(true)
        })
    }

    // -- Corpus listings --
    //
    // Counters and viewer flags are computed inline so one query per type
    // covers a whole feed request. `exclude_author` and `limit` bound the
    // suggestion corpus.

    pub fn list_posts(
        &self,
        viewer_id: &str,
        exclude_author: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let (sql, params) = listing_query(
                "SELECT p.id, p.author_id, u.username, u.name, p.content, p.shares,
                        (SELECT COUNT(*) FROM content_likes l
                          WHERE l.content_type = 'post' AND l.content_id = p.id),
                        (SELECT COUNT(*) FROM content_comments c
                          WHERE c.content_type = 'post' AND c.content_id = p.id),
                        EXISTS(SELECT 1 FROM content_likes l
                          WHERE l.content_type = 'post' AND l.content_id = p.id
                            AND l.user_id = ?1),
                        EXISTS(SELECT 1 FROM content_comments c
                          WHERE c.content_type = 'post' AND c.content_id = p.id
                            AND c.user_id = ?1),
                        p.created_at, p.updated_at
                 FROM posts p JOIN users u ON p.author_id = u.id",
                "p",
                &viewer_id,
                exclude_author.as_ref().map(|a| a as &dyn ToSql),
                limit,
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(PostRow {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        author_username: row.get(2)?,
                        author_name: row.get(3)?,
                        content: row.get(4)?,
                        shares: row.get(5)?,
                        likes: row.get(6)?,
                        comments: row.get(7)?,
                        viewer_liked: row.get(8)?,
                        viewer_commented: row.get(9)?,
                        created_at: row.get(10)?,
                        updated_at: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_products(
        &self,
        viewer_id: &str,
        exclude_author: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<ProductRow>> {
        self.with_conn(|conn| {
            let (sql, params) = listing_query(
                "SELECT p.id, p.author_id, u.username, u.name, p.title, p.description,
                        p.price, p.category, p.condition, p.shares,
                        (SELECT COUNT(*) FROM content_likes l
                          WHERE l.content_type = 'product' AND l.content_id = p.id),
                        (SELECT COUNT(*) FROM content_comments c
                          WHERE c.content_type = 'product' AND c.content_id = p.id),
                        EXISTS(SELECT 1 FROM content_likes l
                          WHERE l.content_type = 'product' AND l.content_id = p.id
                            AND l.user_id = ?1),
                        EXISTS(SELECT 1 FROM content_comments c
                          WHERE c.content_type = 'product' AND c.content_id = p.id
                            AND c.user_id = ?1),
                        p.created_at, p.updated_at
                 FROM products p JOIN users u ON p.author_id = u.id",
                "p",
                &viewer_id,
                exclude_author.as_ref().map(|a| a as &dyn ToSql),
                limit,
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ProductRow {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        author_username: row.get(2)?,
                        author_name: row.get(3)?,
                        title: row.get(4)?,
                        description: row.get(5)?,
                        price: row.get(6)?,
                        category: row.get(7)?,
                        condition: row.get(8)?,
                        shares: row.get(9)?,
                        likes: row.get(10)?,
                        comments: row.get(11)?,
                        viewer_liked: row.get(12)?,
                        viewer_commented: row.get(13)?,
                        created_at: row.get(14)?,
                        updated_at: row.get(15)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_events(
        &self,
        viewer_id: &str,
        exclude_author: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let (sql, params) = listing_query(
                "SELECT e.id, e.author_id, u.username, u.name, e.event_title,
                        e.event_details, e.event_date, e.event_location, e.shares,
                        (SELECT COUNT(*) FROM content_likes l
                          WHERE l.content_type = 'event' AND l.content_id = e.id),
                        (SELECT COUNT(*) FROM content_comments c
                          WHERE c.content_type = 'event' AND c.content_id = e.id),
                        (SELECT COUNT(*) FROM event_interest i WHERE i.event_id = e.id),
                        EXISTS(SELECT 1 FROM content_likes l
                          WHERE l.content_type = 'event' AND l.content_id = e.id
                            AND l.user_id = ?1),
                        EXISTS(SELECT 1 FROM content_comments c
                          WHERE c.content_type = 'event' AND c.content_id = e.id
                            AND c.user_id = ?1),
                        EXISTS(SELECT 1 FROM event_interest i
                          WHERE i.event_id = e.id AND i.user_id = ?1),
                        e.created_at, e.updated_at
                 FROM events e JOIN users u ON e.author_id = u.id",
                "e",
                &viewer_id,
                exclude_author.as_ref().map(|a| a as &dyn ToSql),
                limit,
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(EventRow {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        author_username: row.get(2)?,
                        author_name: row.get(3)?,
                        event_title: row.get(4)?,
                        event_details: row.get(5)?,
                        event_date: row.get(6)?,
                        event_location: row.get(7)?,
                        shares: row.get(8)?,
                        likes: row.get(9)?,
                        comments: row.get(10)?,
                        interested: row.get(11)?,
                        viewer_liked: row.get(12)?,
                        viewer_commented: row.get(13)?,
                        viewer_interested: row.get(14)?,
                        created_at: row.get(15)?,
                        updated_at: row.get(16)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Stories created at or after `cutoff` (RFC 3339). The 24h window is
    /// the caller's business rule; the query just applies the bound.
    pub fn list_stories_since(&self, cutoff: &str) -> Result<Vec<StoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.author_id, u.username, u.name, s.text,
                        s.created_at, s.updated_at
                 FROM stories s JOIN users u ON s.author_id = u.id
                 WHERE s.created_at >= ?1
                 ORDER BY s.created_at DESC",
            )?;
            let rows = stmt
                .query_map([cutoff], |row| {
                    Ok(StoryRow {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        author_username: row.get(2)?,
                        author_name: row.get(3)?,
                        text: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Raw text of everything the user authored plus events they marked
    /// interested, the input of the interest-token profile.
    pub fn user_interest_texts(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut texts: Vec<String> = Vec::new();

            let mut stmt = conn.prepare("SELECT content FROM posts WHERE author_id = ?1")?;
            for text in stmt.query_map([user_id], |row| row.get::<_, String>(0))? {
                texts.push(text?);
            }

            let mut stmt = conn.prepare(
                "SELECT event_details || ' ' || event_title FROM events WHERE author_id = ?1",
            )?;
            for text in stmt.query_map([user_id], |row| row.get::<_, String>(0))? {
                texts.push(text?);
            }

            let mut stmt = conn.prepare(
                "SELECT description || ' ' || title FROM products WHERE author_id = ?1",
            )?;
            for text in stmt.query_map([user_id], |row| row.get::<_, String>(0))? {
                texts.push(text?);
            }

            let mut stmt = conn.prepare(
                "SELECT e.event_details || ' ' || e.event_title
                 FROM events e JOIN event_interest i ON i.event_id = e.id
                 WHERE i.user_id = ?1",
            )?;
            for text in stmt.query_map([user_id], |row| row.get::<_, String>(0))? {
                texts.push(text?);
            }

            Ok(texts)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, password, name, created_at FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                name: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Assemble a listing query with the optional author exclusion and limit.
/// `?1` is always the viewer id (for the viewer flags).
fn listing_query<'a>(
    base: &str,
    alias: &str,
    viewer_id: &'a dyn ToSql,
    exclude_author: Option<&'a dyn ToSql>,
    limit: Option<u32>,
) -> (String, Vec<&'a dyn ToSql>) {
    let mut sql = base.to_string();
    let mut params: Vec<&dyn ToSql> = vec![viewer_id];

    if let Some(author) = exclude_author {
        sql.push_str(&format!(" WHERE {alias}.author_id != ?2"));
        params.push(author);
    }
    sql.push_str(&format!(" ORDER BY {alias}.created_at DESC"));
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {n}"));
    }

    (sql, params)
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

    #[test]
    fn like_toggle_is_self_inverse() {
        let db = test_db();
        db.create_post("p1", "u1", "hello", "2026-01-02T00:00:00Z").unwrap();

        assert!(db.toggle_like("post", "p1", "u2", "2026-01-02T01:00:00Z").unwrap());
        let posts = db.list_posts("u2", None, None).unwrap();
        assert_eq!(posts[0].likes, 1);
        assert!(posts[0].viewer_liked);

        assert!(!db.toggle_like("post", "p1", "u2", "2026-01-02T02:00:00Z").unwrap());
        let posts = db.list_posts("u2", None, None).unwrap();
        assert_eq!(posts[0].likes, 0);
        assert!(!posts[0].viewer_liked);
    }

    #[test]
    fn event_listing_carries_interest_counts() {
        let db = test_db();
        db.create_event(
            "e1", "u1", "Rust meetup", "monthly talks", "2026-02-01T18:00:00Z",
            "Berlin", "2026-01-02T00:00:00Z",
        )
        .unwrap();
        db.toggle_interest("e1", "u2", "2026-01-03T00:00:00Z").unwrap();

        let events = db.list_events("u2", None, None).unwrap();
        assert_eq!(events[0].interested, 1);
        assert!(events[0].viewer_interested);

        let events = db.list_events("u1", None, None).unwrap();
        assert!(!events[0].viewer_interested);
    }

    #[test]
    fn exclude_author_and_limit_bound_the_listing() {
        let db = test_db();
        db.create_post("p1", "u1", "one", "2026-01-02T00:00:00Z").unwrap();
        db.create_post("p2", "u2", "two", "2026-01-03T00:00:00Z").unwrap();
        db.create_post("p3", "u2", "three", "2026-01-04T00:00:00Z").unwrap();

        let posts = db.list_posts("u1", Some("u1"), Some(1)).unwrap();
        assert_eq!(posts.len(), 1);
        // Most recent first, viewer's own content excluded.
        assert_eq!(posts[0].id, "p3");
    }

    #[test]
    fn interest_texts_cover_authored_and_interested_content() {
        let db = test_db();
        db.create_post("p1", "u1", "gardening tips", "2026-01-02T00:00:00Z").unwrap();
        db.create_product("pr1", "u1", "Trowel", "steel hand trowel", 9.5, "tools", "new",
            "2026-01-02T00:00:00Z").unwrap();
        db.create_event("e1", "u2", "Plant swap", "bring cuttings", "2026-03-01T10:00:00Z",
            "Park", "2026-01-02T00:00:00Z").unwrap();
        db.toggle_interest("e1", "u1", "2026-01-03T00:00:00Z").unwrap();

        let texts = db.user_interest_texts("u1").unwrap();
        let joined = texts.join(" ");
        assert!(joined.contains("gardening tips"));
        assert!(joined.contains("steel hand trowel"));
        assert!(joined.contains("Plant swap"));
    }
}
