//! The content-scoring engine: pure functions from a user + corpus snapshot
//! to a ranked list. All I/O happens upstream in the feed aggregator; this
//! crate never touches the store and is deterministic for a fixed input.

pub mod interests;
pub mod scoring;

pub use interests::interest_tokens;
pub use scoring::{FEED_LIMIT, SUGGESTION_LIMIT, rank_feed, rank_suggestions, recency_score};
