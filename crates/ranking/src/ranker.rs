//! The Ranker: candidate generation, scoring, normalization and top-N
//! selection for one user.
//!
//! ## Algorithm
//! 1. Resolve the user; unknown users get an empty ranking
//! 2. Optionally require a minimum interaction history
//! 3. Candidates = all known items minus the items the user has seen
//! 4. Score every candidate with the Scoring Engine
//! 5. Apply the normalization policy over this candidate set
//! 6. Sort by score descending, ties by ascending item id
//! 7. Truncate to `limit`
//!
//! The ranker holds no per-request state. Metadata is never consulted, so
//! rankings do not depend on catalog completeness.

use crate::candidate::{ScoredCandidate, select_top, unseen_candidates};
use crate::error::Result;
use crate::normalization::Normalization;
use crate::scoring::{ScoringEngine, ScoringMode};
use data_loader::{Dataset, IdentifierMap, InteractionIndex, LookupError, UserId};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Ranks unseen items for a user against shared, immutable stores
#[derive(Debug, Clone)]
pub struct Ranker {
    user_ids: Arc<IdentifierMap>,
    item_ids: Arc<IdentifierMap>,
    scoring: ScoringEngine,
    normalization: Normalization,
}

impl Ranker {
    pub fn new(user_ids: Arc<IdentifierMap>, item_ids: Arc<IdentifierMap>, scoring: ScoringEngine) -> Self {
        Self {
            user_ids,
            item_ids,
            scoring,
            normalization: Normalization::default(),
        }
    }

    /// Ranker over a loaded dataset's model and identifier maps
    pub fn from_dataset(dataset: &Dataset, mode: ScoringMode) -> Self {
        let scoring = ScoringEngine::new(Arc::clone(&dataset.model)).with_mode(mode);
        Self::new(Arc::clone(&dataset.user_ids), Arc::clone(&dataset.item_ids), scoring)
    }

    /// Configure the normalization policy (default: none)
    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Top `limit` unseen items for `user_id`, best first.
    ///
    /// Returns an empty ranking for unknown users, for users with fewer than
    /// `min_interactions` recorded interactions, and when the user has seen
    /// every item. Only an internal index mismatch is an error.
    #[instrument(skip(self, interactions), fields(normalization = ?self.normalization))]
    pub fn rank(
        &self,
        interactions: &InteractionIndex,
        user_id: UserId,
        limit: usize,
        min_interactions: usize,
    ) -> Result<Vec<ScoredCandidate>> {
        let user_idx = match self.user_ids.to_internal(user_id) {
            Ok(idx) => idx,
            Err(LookupError::UnknownIdentifier { .. }) => {
                debug!("User {} is not in the model, no ranking", user_id);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let seen = interactions.seen_items(user_id);
        if seen.len() < min_interactions {
            debug!(
                "User {} has {} interactions, below the minimum of {}",
                user_id,
                seen.len(),
                min_interactions
            );
            return Ok(Vec::new());
        }

        let candidates = unseen_candidates(&self.item_ids, seen);
        debug!(
            "Candidate set for user {}: {} items ({} seen)",
            user_id,
            candidates.len(),
            seen.len()
        );
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = self
            .scoring
            .score_all(user_idx, &candidates)
            .inspect_err(|e| error!("Scoring failed for user {}: {}", user_id, e))?;
        self.normalization.apply(&mut scored);

        let ranked = select_top(scored, limit);
        debug!("Selected {} of {} candidates", ranked.len(), candidates.len());
        Ok(ranked)
    }
}
