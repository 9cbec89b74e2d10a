//! Core domain types shared by the loaders and the ranking engine.
//!
//! - Type aliases keep user ids and item ids apart in signatures
//! - `Dataset` bundles every immutable store the service reads from

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::catalog::MetadataCatalog;
use crate::id_map::IdentifierMap;
use crate::interactions::InteractionIndex;
use crate::model::LatentFactorModel;

// =============================================================================
// Type Aliases
// =============================================================================

/// External (public) identifier of a user
pub type UserId = u32;

/// External (public) identifier of an item (a movie in the shipped dataset)
pub type ItemId = u32;

/// Which identifier space a map, lookup or error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Item,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::User => write!(f, "user"),
            EntityKind::Item => write!(f, "item"),
        }
    }
}

// =============================================================================
// Catalog and interaction records
// =============================================================================

/// Descriptive attributes for one item.
///
/// Only `title` is required; every other attribute may be missing from the
/// source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub item_id: ItemId,
    pub title: String,
    /// Split from the `|`-joined source field, in source order
    pub genres: Vec<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub average_rating: Option<f64>,
    pub total_ratings: u32,
}

impl MetadataEntry {
    /// Entry carrying only the required attributes
    pub fn new(item_id: ItemId, title: impl Into<String>) -> Self {
        Self {
            item_id,
            title: title.into(),
            genres: Vec::new(),
            overview: None,
            poster_path: None,
            release_date: None,
            average_rating: None,
            total_ratings: 0,
        }
    }

    pub fn with_genres(mut self, genres: Vec<String>) -> Self {
        self.genres = genres;
        self
    }

    pub fn with_rating_stats(mut self, average_rating: f64, total_ratings: u32) -> Self {
        self.average_rating = Some(average_rating);
        self.total_ratings = total_ratings;
        self
    }
}

/// One prior exposure of a user to an item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Explicit rating, when the source has one
    pub rating: Option<f32>,
    /// Unix timestamp, when the source has one
    pub timestamp: Option<i64>,
}

impl InteractionRecord {
    pub fn new(user_id: UserId, item_id: ItemId) -> Self {
        Self {
            user_id,
            item_id,
            rating: None,
            timestamp: None,
        }
    }

    pub fn rated(user_id: UserId, item_id: ItemId, rating: f32) -> Self {
        Self {
            rating: Some(rating),
            ..Self::new(user_id, item_id)
        }
    }
}

// =============================================================================
// Dataset - every store the recommendation service reads
// =============================================================================

/// All loaded stores, each behind an `Arc` so the service and its workers can
/// share them without copying.
///
/// Nothing in here is mutated after `Dataset::load` returns.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub model: Arc<LatentFactorModel>,
    pub user_ids: Arc<IdentifierMap>,
    pub item_ids: Arc<IdentifierMap>,
    pub catalog: Arc<MetadataCatalog>,
    pub interactions: Arc<InteractionIndex>,
}

impl Dataset {
    /// Assemble a dataset from already-built stores.
    ///
    /// The model and the identifier maps are cross-checked here, so a dataset
    /// that exists is always internally consistent.
    pub fn new(
        model: LatentFactorModel,
        user_ids: IdentifierMap,
        item_ids: IdentifierMap,
        catalog: MetadataCatalog,
        interactions: InteractionIndex,
    ) -> crate::Result<Self> {
        model.check_against(&user_ids, &item_ids)?;
        Ok(Self {
            model: Arc::new(model),
            user_ids: Arc::new(user_ids),
            item_ids: Arc::new(item_ids),
            catalog: Arc::new(catalog),
            interactions: Arc::new(interactions),
        })
    }

    /// (users, items, catalog entries, interactions)
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.user_ids.len(),
            self.item_ids.len(),
            self.catalog.len(),
            self.interactions.len(),
        )
    }
}
