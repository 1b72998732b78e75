//! Weighted ("roulette wheel") pick of the hero topic.
//!
//! Each topic's share of the wheel is its relevance score. Negative or
//! non-finite scores count as zero. When the wheel has no area, or rounding
//! walks off the end, the first topic is returned.

use rand::Rng;

use crate::analyze::clustering::Topic;

fn weight(t: &Topic) -> f64 {
    if t.relevance_score.is_finite() && t.relevance_score > 0.0 {
        t.relevance_score
    } else {
        0.0
    }
}

/// Pick one topic with probability proportional to its score.
/// `None` only for an empty slice.
pub fn pick_weighted<'a, R: Rng>(topics: &'a [Topic], rng: &mut R) -> Option<&'a Topic> {
    let first = topics.first()?;
    let total: f64 = topics.iter().map(weight).sum();
    if !total.is_finite() || total <= 0.0 {
        return Some(first);
    }

    let target = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for t in topics {
        let w = weight(t);
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        if target < cumulative {
            return Some(t);
        }
    }
    Some(first)
}
