//! # Ranking Crate
//!
//! Scores and ranks the items a user has not seen yet, using the
//! latent-factor model loaded by `data-loader`.
//!
//! ## Components
//!
//! - **candidate**: candidate generation (all items minus seen items), the
//!   ranking order and top-N selection
//! - **scoring**: the Scoring Engine, sequential or on the rayon pool
//! - **normalization**: optional per-request min-max rescaling
//! - **ranker**: the full per-user pipeline
//!
//! ## Example Usage
//!
//! ```ignore
//! use ranking::{Normalization, Ranker, ScoringMode};
//!
//! let ranker = Ranker::from_dataset(&dataset, ScoringMode::Sequential)
//!     .with_normalization(Normalization::rating_scale());
//!
//! let top = ranker.rank(&dataset.interactions, user_id, 10, 0)?;
//! for candidate in &top {
//!     println!("{} -> {:.3}", candidate.item_id, candidate.score);
//! }
//! ```

pub mod candidate;
pub mod error;
pub mod normalization;
pub mod ranker;
pub mod scoring;

// Re-export main types
pub use candidate::{Candidate, ScoredCandidate, ranking_order, select_top, unseen_candidates};
pub use error::{RankError, Result};
pub use normalization::Normalization;
pub use ranker::Ranker;
pub use scoring::{ScoringEngine, ScoringMode};
