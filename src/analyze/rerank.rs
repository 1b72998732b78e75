// src/analyze/rerank.rs
//! Deterministic pass over the model's topics.
//!
//! - Topics citing at least one Bluesky source get `BLUESKY_BOOST`, clamped to
//!   `MAX_SCORE`. The signal is the structured `sources` list only.
//! - The list is then stable-sorted by score, descending; ties keep model order.

use crate::analyze::clustering::{Topic, MAX_SCORE, MIN_SCORE};
use crate::ingest::types::Platform;

pub const BLUESKY_BOOST: f64 = 1.0;

/// Apply the Bluesky boost in place.
pub fn boost_bluesky(topics: &mut [Topic]) {
    for t in topics.iter_mut() {
        if t.has_platform(Platform::Bluesky) {
            t.relevance_score = (t.relevance_score + BLUESKY_BOOST).clamp(MIN_SCORE, MAX_SCORE);
        }
    }
}

/// Boost, then sort non-increasing by score (stable).
pub fn rank_topics(mut topics: Vec<Topic>) -> Vec<Topic> {
    boost_bluesky(&mut topics);
    topics.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    topics
}
