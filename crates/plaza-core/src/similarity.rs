//! Relevance signals for promotion ranking.
//!
//! Score = (viewed + interest + bookmark + proximity) / 4, where the first
//! three are Jaccard similarities in `[0, 1]` and proximity is the reciprocal
//! of the distance to the nearest promoter.

use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// `|A ∩ B| / |A ∪ B|`, defined as 0 when both sets are empty.
pub fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Reciprocal distance with distances below `min_distance` clamped up to it.
///
/// A promotion without a located promoter has no proximity signal.
pub fn proximity(distance: Option<f64>, min_distance: f64) -> f64 {
    match distance {
        Some(d) => 1.0 / d.max(min_distance),
        None => 0.0,
    }
}

/// The three behavioral similarity signals for one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub viewed_similarity: f64,
    pub interest_similarity: f64,
    pub bookmark_similarity: f64,
}

impl Signals {
    /// Equal weighting across the three similarities and proximity.
    pub fn score(&self, proximity: f64) -> f64 {
        (self.viewed_similarity + self.interest_similarity + self.bookmark_similarity + proximity)
            / 4.0
    }
}
