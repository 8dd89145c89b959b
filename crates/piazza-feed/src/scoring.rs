use chrono::{DateTime, Utc};
use uuid::Uuid;

use piazza_types::api::ScoredItem;
use piazza_types::models::ContentItem;

/// The ranked feed returns at most this many items.
pub const FEED_LIMIT: usize = 50;
/// Suggestions return at most this many items.
pub const SUGGESTION_LIMIT: usize = 10;

/// Hours over which recency decays to zero (7 days).
const RECENCY_WINDOW_HOURS: f64 = 168.0;
const RECENCY_WEIGHT: f64 = 30.0;

const OWN_CONTENT_BOOST: f64 = 50.0;
const INTERESTED_EVENT_BOOST: f64 = 30.0;
const STORY_BOOST: f64 = 20.0;
const UNEXPLORED_BOOST: f64 = 20.0;

const FEED_RELEVANCE_WEIGHT: f64 = 10.0;
const SUGGESTION_RELEVANCE_WEIGHT: f64 = 15.0;

/// Linear recency decay: 1.0 at creation, 0.0 at 168 hours, floored at 0
/// beyond. A future-dated item scores above 1.0; the store sets
/// `created_at` itself, so that only arises in synthetic input.
pub fn recency_score(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - created_at).num_milliseconds() as f64 / 3_600_000.0;
    (1.0 - hours / RECENCY_WINDOW_HOURS).max(0.0)
}

/// How many interest tokens appear in `text` (already lowercased) as
/// substrings. Each hit contributes one `weight` worth of relevance.
fn relevance_score(text: &str, interests: &[String], weight: f64) -> f64 {
    interests
        .iter()
        .filter(|token| text.contains(token.as_str()))
        .count() as f64
        * weight
}

fn score_for_feed(
    item: ContentItem,
    viewer_id: Uuid,
    interests: &[String],
    now: DateTime<Utc>,
) -> ScoredItem {
    let mut score = recency_score(item.created_at(), now) * RECENCY_WEIGHT;

    score += item.engagement_score() as f64;

    let is_own_content = item.author_id() == viewer_id;
    let is_interested = item.viewer_interested();
    if is_own_content {
        score += OWN_CONTENT_BOOST;
    }
    if is_interested {
        score += INTERESTED_EVENT_BOOST;
    }

    // The feed matches against the item text plus the author's username.
    let text = format!("{} {}", item.text_for_matching(), item.author().username).to_lowercase();
    score += relevance_score(&text, interests, FEED_RELEVANCE_WEIGHT);

    if item.is_story() {
        score += STORY_BOOST;
    }

    ScoredItem {
        item,
        score,
        is_own_content,
        is_interested,
    }
}

fn score_for_suggestion(item: ContentItem, interests: &[String]) -> ScoredItem {
    let mut score = item.engagement_score() as f64;

    let text = item.text_for_matching().to_lowercase();
    score += relevance_score(&text, interests, SUGGESTION_RELEVANCE_WEIGHT);

    if !item.viewer_has_interacted() {
        score += UNEXPLORED_BOOST;
    }

    ScoredItem {
        item,
        score,
        is_own_content: false,
        is_interested: false,
    }
}

/// Score and rank the whole corpus for one viewer, capped at [`FEED_LIMIT`].
/// The sort is stable: equal scores keep their input order.
pub fn rank_feed(
    corpus: Vec<ContentItem>,
    viewer_id: Uuid,
    interests: &[String],
    now: DateTime<Utc>,
) -> Vec<ScoredItem> {
    let mut scored: Vec<ScoredItem> = corpus
        .into_iter()
        .map(|item| score_for_feed(item, viewer_id, interests, now))
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(FEED_LIMIT);
    scored
}

/// Score and rank suggestions, capped at [`SUGGESTION_LIMIT`]. The caller
/// supplies a corpus that already excludes the viewer's own content; this
/// function filters defensively as well so the contract holds regardless.
pub fn rank_suggestions(
    corpus: Vec<ContentItem>,
    viewer_id: Uuid,
    interests: &[String],
) -> Vec<ScoredItem> {
    let mut scored: Vec<ScoredItem> = corpus
        .into_iter()
        .filter(|item| item.author_id() != viewer_id)
        .map(|item| score_for_suggestion(item, interests))
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(SUGGESTION_LIMIT);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use piazza_types::models::{Author, Event, Post, Story};

    fn author(id: Uuid, username: &str) -> Author {
        Author {
            id,
            username: username.to_string(),
            name: username.to_string(),
        }
    }

    fn post(id: Uuid, author_id: Uuid, content: &str, likes: u32, created_at: DateTime<Utc>) -> ContentItem {
        ContentItem::Post(Post {
            id,
            author: author(author_id, "poster"),
            content: content.to_string(),
            likes,
            comments: 0,
            shares: 0,
            liked_by_viewer: false,
            commented_by_viewer: false,
            created_at,
            updated_at: created_at,
        })
    }

    fn story(author_id: Uuid, created_at: DateTime<Utc>) -> ContentItem {
        ContentItem::Story(Story {
            id: Uuid::new_v4(),
            author: author(author_id, "narrator"),
            text: String::new(),
            created_at,
            updated_at: created_at,
        })
    }

    fn event(author_id: Uuid, interested: u32, viewer_interested: bool, created_at: DateTime<Utc>) -> ContentItem {
        ContentItem::Event(Event {
            id: Uuid::new_v4(),
            author: author(author_id, "organizer"),
            event_title: "Meetup".to_string(),
            event_details: "details".to_string(),
            event_date: created_at,
            event_location: "here".to_string(),
            likes: 0,
            comments: 0,
            shares: 0,
            interested,
            liked_by_viewer: false,
            commented_by_viewer: false,
            viewer_interested,
            created_at,
            updated_at: created_at,
        })
    }

    #[test]
    fn recency_hits_zero_at_the_window_edge_and_never_goes_negative() {
        let now = Utc::now();

        let fresh = recency_score(now, now);
        assert!((fresh - 1.0).abs() < 1e-9);

        let halfway = recency_score(now - Duration::hours(84), now);
        assert!(halfway > 0.0 && halfway < 1.0);

        assert_eq!(recency_score(now - Duration::hours(168), now), 0.0);
        // Never negative, however old.
        assert_eq!(recency_score(now - Duration::days(365), now), 0.0);

        // The formula is an unbounded max(0, ...): a future timestamp
        // scores above 1.0 rather than capping.
        let future = recency_score(now + Duration::hours(168), now);
        assert!((future - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ranking_is_non_increasing_and_stable() {
        let now = Utc::now();
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();

        // Two items with identical inputs score identically; stability keeps
        // their input order.
        let first = post(Uuid::new_v4(), other, "same", 1, now - Duration::hours(10));
        let second = post(Uuid::new_v4(), other, "same", 1, now - Duration::hours(10));
        let first_id = first.id();
        let second_id = second.id();

        let ranked = rank_feed(vec![first, second], viewer, &[], now);
        assert_eq!(ranked[0].item.id(), first_id);
        assert_eq!(ranked[1].item.id(), second_id);
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn empty_interest_profile_reduces_to_recency_engagement_identity() {
        let now = Utc::now();
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();

        // Fixture of three posts with distinct timestamps and like counts.
        let a = post(Uuid::new_v4(), other, "alpha", 0, now - Duration::hours(1));
        let b = post(Uuid::new_v4(), other, "beta", 20, now - Duration::hours(100));
        let c = post(Uuid::new_v4(), other, "gamma", 3, now - Duration::hours(50));
        let (a_id, b_id, c_id) = (a.id(), b.id(), c.id());

        let ranked = rank_feed(vec![a, b, c], viewer, &[], now);
        let order: Vec<Uuid> = ranked.iter().map(|s| s.item.id()).collect();

        // a: ~29.8 recency; b: 40 likes + ~12.1 recency; c: 6 likes + ~21 recency.
        assert_eq!(order, vec![b_id, a_id, c_id]);
    }

    #[test]
    fn own_content_and_interest_boosts_apply() {
        let now = Utc::now();
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();
        let when = now - Duration::hours(200); // outside recency window

        let own = post(Uuid::new_v4(), viewer, "mine", 0, when);
        let interested = event(other, 0, true, when);
        let plain = post(Uuid::new_v4(), other, "theirs", 0, when);

        let ranked = rank_feed(vec![plain, interested, own], viewer, &[], now);

        assert_eq!(ranked[0].score, 50.0);
        assert!(ranked[0].is_own_content);
        assert_eq!(ranked[1].score, 30.0);
        assert!(ranked[1].is_interested);
        assert_eq!(ranked[2].score, 0.0);
    }

    #[test]
    fn story_boost_applies_in_the_feed() {
        let now = Utc::now();
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();
        let when = now - Duration::hours(200);

        let ranked = rank_feed(vec![story(other, when)], viewer, &[], now);
        assert_eq!(ranked[0].score, 20.0);
    }

    #[test]
    fn relevance_counts_each_matching_token_once() {
        let now = Utc::now();
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();
        let when = now - Duration::hours(200);

        let item = post(Uuid::new_v4(), other, "fresh sourdough bread", 0, when);
        let interests = vec![
            "sourdough".to_string(),
            "bread".to_string(),
            "cycling".to_string(),
        ];

        let ranked = rank_feed(vec![item], viewer, &interests, now);
        assert_eq!(ranked[0].score, 20.0); // two hits at 10 each
    }

    #[test]
    fn feed_matches_against_the_author_username() {
        let now = Utc::now();
        let viewer = Uuid::new_v4();
        let when = now - Duration::hours(200);

        let item = post(Uuid::new_v4(), Uuid::new_v4(), "no overlap here", 0, when);
        let interests = vec!["poster".to_string()];

        let ranked = rank_feed(vec![item], viewer, &interests, now);
        assert_eq!(ranked[0].score, 10.0);
    }

    #[test]
    fn feed_is_capped_at_fifty() {
        let now = Utc::now();
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();

        let corpus: Vec<ContentItem> = (0..80)
            .map(|i| post(Uuid::new_v4(), other, "x", i, now - Duration::hours(i as i64)))
            .collect();

        assert_eq!(rank_feed(corpus, viewer, &[], now).len(), FEED_LIMIT);
    }

    #[test]
    fn suggestions_never_include_own_content_and_cap_at_ten() {
        let now = Utc::now();
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut corpus: Vec<ContentItem> = (0..15)
            .map(|i| post(Uuid::new_v4(), other, "x", i, now))
            .collect();
        corpus.push(post(Uuid::new_v4(), viewer, "mine", 100, now));

        let ranked = rank_suggestions(corpus, viewer, &[]);
        assert_eq!(ranked.len(), SUGGESTION_LIMIT);
        assert!(ranked.iter().all(|s| s.item.author_id() != viewer));
    }

    #[test]
    fn unexplored_suggestions_get_the_extra_boost() {
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();

        let untouched = event(other, 0, false, now);
        let explored = event(other, 1, true, now); // viewer already interested

        let ranked = rank_suggestions(vec![explored, untouched], viewer, &[]);

        // untouched: +20 unexplored; explored: interested*4 engagement only.
        assert_eq!(ranked[0].score, 20.0);
        assert_eq!(ranked[1].score, 4.0);
    }

    #[test]
    fn suggestion_relevance_uses_the_fifteen_point_weight() {
        let viewer = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();

        let item = post(Uuid::new_v4(), other, "homemade pasta night", 0, now);
        let interests = vec!["pasta".to_string()];

        let ranked = rank_suggestions(vec![item], viewer, &interests);
        // 15 relevance + 20 unexplored.
        assert_eq!(ranked[0].score, 35.0);
    }
}
