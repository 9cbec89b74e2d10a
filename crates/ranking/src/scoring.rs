//! Scoring Engine: turns candidates into predicted scores via the model.

use crate::candidate::{Candidate, ScoredCandidate};
use crate::error::Result;
use data_loader::LatentFactorModel;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a request's candidates are scored.
///
/// Both modes produce identical output in identical order; parallel scoring
/// only pays off for large candidate sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoringMode {
    #[default]
    Sequential,
    /// Use the rayon pool once a request has at least `min_batch` candidates
    Parallel { min_batch: usize },
}

/// Scores (user, item) pairs against a shared, immutable model
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    model: Arc<LatentFactorModel>,
    mode: ScoringMode,
}

impl ScoringEngine {
    pub fn new(model: Arc<LatentFactorModel>) -> Self {
        Self {
            model,
            mode: ScoringMode::default(),
        }
    }

    /// Configure the scoring mode (default: sequential)
    pub fn with_mode(mut self, mode: ScoringMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    pub fn model(&self) -> &LatentFactorModel {
        &self.model
    }

    /// Predicted score for one pair
    pub fn score(&self, user_idx: usize, item_idx: usize) -> Result<f64> {
        Ok(self.model.predict(user_idx, item_idx)?)
    }

    /// Score every candidate for `user_idx`, preserving candidate order
    pub fn score_all(&self, user_idx: usize, candidates: &[Candidate]) -> Result<Vec<ScoredCandidate>> {
        let score_one = |candidate: &Candidate| -> Result<ScoredCandidate> {
            let score = self.score(user_idx, candidate.item_idx)?;
            Ok(ScoredCandidate::new(candidate.item_id, score))
        };

        match self.mode {
            ScoringMode::Parallel { min_batch } if candidates.len() >= min_batch => {
                candidates.par_iter().map(score_one).collect()
            }
            _ => candidates.iter().map(score_one).collect(),
        }
    }
}
