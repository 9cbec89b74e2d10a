//! Optional per-request rescaling of raw predicted scores.

use crate::candidate::ScoredCandidate;
use crate::error::{RankError, Result};
use serde::{Deserialize, Serialize};

/// Score normalization policy
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalization {
    /// Raw predictions are returned as-is
    #[default]
    None,
    /// Linear rescale of one request's candidate scores onto `[lo, hi]`
    MinMax { lo: f64, hi: f64 },
}

impl Normalization {
    /// Min-max policy, rejecting empty, inverted or non-finite ranges
    pub fn min_max(lo: f64, hi: f64) -> Result<Self> {
        let policy = Normalization::MinMax { lo, hi };
        policy.validate()?;
        Ok(policy)
    }

    /// The 1-5 star scale predictions are usually shown on
    pub fn rating_scale() -> Self {
        Normalization::MinMax { lo: 1.0, hi: 5.0 }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Normalization::None => Ok(()),
            Normalization::MinMax { lo, hi } if lo.is_finite() && hi.is_finite() && lo < hi => Ok(()),
            Normalization::MinMax { lo, hi } => Err(RankError::InvalidRange { lo, hi }),
        }
    }

    /// Rescale `scored` in place.
    ///
    /// `scaled = lo + (raw - min) * (hi - lo) / (max - min)`, with `min` and
    /// `max` taken over the finite scores of this candidate set only. When
    /// every finite score is the same there is no range to map, and those
    /// candidates get the midpoint `(lo + hi) / 2`.
    ///
    /// A score that overflowed to `+inf` maps to `hi`; `-inf` and NaN map
    /// to `lo`.
    pub fn apply(&self, scored: &mut [ScoredCandidate]) {
        let Normalization::MinMax { lo, hi } = *self else {
            return;
        };

        let (min, max) = scored
            .iter()
            .map(|c| c.score)
            .filter(|score| score.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), score| {
                (min.min(score), max.max(score))
            });
        // Halved so that the span of two finite extremes cannot overflow.
        let half_range = max / 2.0 - min / 2.0;
        let midpoint = (lo + hi) / 2.0;

        for candidate in scored.iter_mut() {
            let raw = candidate.score;
            candidate.score = if raw == f64::INFINITY {
                hi
            } else if !raw.is_finite() {
                lo
            } else if half_range > 0.0 {
                lo + (raw / 2.0 - min / 2.0) / half_range * (hi - lo)
            } else {
                midpoint
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(scores: &[f64]) -> Vec<ScoredCandidate> {
        scores
            .iter()
            .enumerate()
            .map(|(idx, &score)| ScoredCandidate::new(idx as u32 + 1, score))
            .collect()
    }

    fn scores(candidates: &[ScoredCandidate]) -> Vec<f64> {
        candidates.iter().map(|c| c.score).collect()
    }

    #[test]
    fn test_none_leaves_scores_untouched() {
        let mut candidates = scored(&[3.2, -1.0, 7.5]);
        Normalization::None.apply(&mut candidates);
        assert_eq!(scores(&candidates), vec![3.2, -1.0, 7.5]);
    }

    #[test]
    fn test_min_max_maps_onto_range() {
        let mut candidates = scored(&[2.0, 4.0, 3.0]);
        Normalization::rating_scale().apply(&mut candidates);
        assert_eq!(scores(&candidates), vec![1.0, 5.0, 3.0]);
    }

    #[test]
    fn test_equal_scores_fall_back_to_midpoint() {
        let mut candidates = scored(&[3.7, 3.7, 3.7]);
        Normalization::rating_scale().apply(&mut candidates);
        assert_eq!(scores(&candidates), vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_single_candidate_gets_midpoint() {
        let mut candidates = scored(&[10.0]);
        Normalization::min_max(0.0, 1.0).unwrap().apply(&mut candidates);
        assert_eq!(scores(&candidates), vec![0.5]);
    }

    #[test]
    fn test_overflowed_scores_pin_to_range_ends() {
        let mut candidates = scored(&[2.0, f64::INFINITY, 4.0, f64::NEG_INFINITY, f64::NAN]);
        Normalization::rating_scale().apply(&mut candidates);
        assert_eq!(scores(&candidates), vec![1.0, 5.0, 5.0, 1.0, 1.0]);
    }

    #[test]
    fn test_lone_finite_score_stays_below_infinite_one() {
        let mut candidates = scored(&[3.0, f64::INFINITY]);
        Normalization::rating_scale().apply(&mut candidates);
        assert_eq!(scores(&candidates), vec![3.0, 5.0]);
    }

    #[test]
    fn test_extreme_finite_scores_keep_their_order() {
        let mut candidates = scored(&[-f64::MAX, 0.0, f64::MAX]);
        Normalization::min_max(0.0, 1.0).unwrap().apply(&mut candidates);
        assert_eq!(scores(&candidates), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_empty_slice_is_fine() {
        let mut candidates: Vec<ScoredCandidate> = Vec::new();
        Normalization::rating_scale().apply(&mut candidates);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert_eq!(
            Normalization::min_max(5.0, 1.0),
            Err(RankError::InvalidRange { lo: 5.0, hi: 1.0 })
        );
        assert!(Normalization::min_max(1.0, 1.0).is_err());
        assert!(Normalization::min_max(f64::NEG_INFINITY, 1.0).is_err());
        assert!(Normalization::None.validate().is_ok());
    }

    #[test]
    fn test_policy_serde() {
        let policy: Normalization = serde_json::from_str(r#"{"kind":"min_max","lo":1.0,"hi":5.0}"#).unwrap();
        assert_eq!(policy, Normalization::rating_scale());

        let policy: Normalization = serde_json::from_str(r#"{"kind":"none"}"#).unwrap();
        assert_eq!(policy, Normalization::None);
    }
}
