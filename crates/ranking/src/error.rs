//! Errors raised while ranking.

use data_loader::LookupError;
use thiserror::Error;

/// Failures the ranker cannot turn into an empty result.
///
/// Unknown users are not errors (they get no recommendations), so the only
/// lookup failure that surfaces here is an index that the model does not
/// have, which means the identifier maps and the model are out of sync.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankError {
    #[error("Store lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("Invalid normalization range [{lo}, {hi}]")]
    InvalidRange { lo: f64, hi: f64 },
}

pub type Result<T> = std::result::Result<T, RankError>;
