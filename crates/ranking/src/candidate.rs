//! Candidate generation and the ranking order.
//!
//! A candidate is any item the model knows that the user has not seen yet.
//! Candidates are enumerated in item-index order so that everything
//! downstream sees the same sequence for the same inputs.

use data_loader::{IdentifierMap, ItemId};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// An unscored candidate: its external id and its row in the item factors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub item_id: ItemId,
    pub item_idx: usize,
}

/// A candidate with its predicted (or normalized) score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub item_id: ItemId,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn new(item_id: ItemId, score: f64) -> Self {
        Self { item_id, score }
    }
}

/// Every item in `items` that is not in `seen`, in index order
pub fn unseen_candidates(items: &IdentifierMap, seen: &BTreeSet<ItemId>) -> Vec<Candidate> {
    items
        .iter()
        .filter(|(item_id, _)| !seen.contains(item_id))
        .map(|(item_id, item_idx)| Candidate { item_id, item_idx })
        .collect()
}

/// Ranking order: higher score first, equal scores by ascending item id.
///
/// Finite scores compare numerically (so `-0.0 == 0.0` is a tie). A NaN
/// falls back to `total_cmp`, which still yields a consistent total order.
pub fn ranking_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or_else(|| b.score.total_cmp(&a.score))
        .then_with(|| a.item_id.cmp(&b.item_id))
}

/// Keep the `limit` best candidates, sorted by `ranking_order`.
///
/// Item ids are unique within a candidate set, so the order is total and the
/// selection does not depend on the input order.
pub fn select_top(mut scored: Vec<ScoredCandidate>, limit: usize) -> Vec<ScoredCandidate> {
    if limit == 0 {
        return Vec::new();
    }
    if limit < scored.len() {
        scored.select_nth_unstable_by(limit - 1, ranking_order);
        scored.truncate(limit);
    }
    scored.sort_unstable_by(ranking_order);
    scored
}
