//! # Recommendation Service
//!
//! Coordinates one recommendation request:
//! 1. Take a snapshot of the interaction index
//! 2. Rank the user's unseen items (candidates, scoring, normalization, top-N)
//! 3. Enrich the selected items with catalog metadata
//!
//! Items without a catalog entry are dropped after selection and not
//! replaced, so a response can hold fewer than `limit` entries.
//!
//! The model, identifier maps and catalog are shared read-only. The
//! interaction index is the one store that can change while serving: it sits
//! behind a lock as an `Arc`, and each request clones that `Arc` once, so a
//! swap never affects a request already in flight.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, ServiceConfig};
use data_loader::{
    DataLoadError, Dataset, IdentifierMap, InteractionIndex, ItemId, LatentFactorModel,
    MetadataCatalog, TableLoader, UserId,
};
use ranking::{RankError, Ranker, ScoredCandidate, ScoringEngine};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Ranking failed: {0}")]
    Ranking(#[from] RankError),

    #[error("Invalid service configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Loading failed: {0}")]
    Load(#[from] DataLoadError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// One recommended item, as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub item_id: ItemId,
    pub title: String,
    pub genres: Vec<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub average_rating: Option<f64>,
    pub total_ratings: u32,
    pub score: f64,
}

/// Ranks items for users against the loaded stores
pub struct RecommendationService {
    ranker: Ranker,
    user_ids: Arc<IdentifierMap>,
    item_ids: Arc<IdentifierMap>,
    catalog: Arc<MetadataCatalog>,
    interactions: RwLock<Arc<InteractionIndex>>,
    config: ServiceConfig,
}

impl RecommendationService {
    /// Build the service over a loaded dataset
    pub fn new(dataset: Arc<Dataset>, config: ServiceConfig) -> Result<Self, ServiceError> {
        Self::from_parts(
            Arc::clone(&dataset.model),
            Arc::clone(&dataset.user_ids),
            Arc::clone(&dataset.item_ids),
            Arc::clone(&dataset.catalog),
            Arc::clone(&dataset.interactions),
            config,
        )
    }

    /// Build the service from individually constructed stores.
    ///
    /// The model and the identifier maps are cross-checked, and the
    /// configuration validated, before anything is served.
    pub fn from_parts(
        model: Arc<LatentFactorModel>,
        user_ids: Arc<IdentifierMap>,
        item_ids: Arc<IdentifierMap>,
        catalog: Arc<MetadataCatalog>,
        interactions: Arc<InteractionIndex>,
        config: ServiceConfig,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        model.check_against(&user_ids, &item_ids)?;

        let scoring = ScoringEngine::new(model).with_mode(config.scoring_mode);
        let ranker = Ranker::new(Arc::clone(&user_ids), Arc::clone(&item_ids), scoring)
            .with_normalization(config.normalization);

        Ok(Self {
            ranker,
            user_ids,
            item_ids,
            catalog,
            interactions: RwLock::new(interactions),
            config,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn user_count(&self) -> usize {
        self.user_ids.len()
    }

    pub fn item_count(&self) -> usize {
        self.item_ids.len()
    }

    /// Whether the model has factors for `user_id`
    pub fn knows_user(&self, user_id: UserId) -> bool {
        self.user_ids.contains(user_id)
    }

    /// The interaction index requests currently see
    pub fn interactions(&self) -> Arc<InteractionIndex> {
        Arc::clone(&self.interactions.read())
    }

    /// Swap in a new interaction index; requests already running keep theirs
    pub fn replace_interactions(&self, interactions: InteractionIndex) {
        let (users, total) = (interactions.user_count(), interactions.len());
        *self.interactions.write() = Arc::new(interactions);
        info!("Replaced interaction index: {} users, {} interactions", users, total);
    }

    /// Re-read interaction records from `tables` and swap them in.
    ///
    /// On failure the current index stays in place.
    pub fn reload_interactions<T>(&self, tables: &T) -> Result<usize, ServiceError>
    where
        T: TableLoader + ?Sized,
    {
        let records = tables.load_interactions()?;
        let count = records.len();
        self.replace_interactions(InteractionIndex::from_records(&records));
        Ok(count)
    }

    /// Top `limit` recommendations for `user_id`, best first.
    ///
    /// Unknown users and users with nothing left to recommend get an empty
    /// list. Only internal inconsistencies are errors.
    #[instrument(skip(self))]
    pub fn get_recommendations(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let start_time = Instant::now();
        let interactions = self.interactions();

        let ranked = self.ranker.rank(
            &interactions,
            user_id,
            limit,
            self.config.min_interactions_for_scoring,
        )?;
        debug!("Ranked {} items for user {}", ranked.len(), user_id);

        let recommendations = self.enrich(ranked);

        info!(
            "Returned {} recommendations for user {} in {:.2?}",
            recommendations.len(),
            user_id,
            start_time.elapsed()
        );
        Ok(recommendations)
    }

    /// Attach catalog metadata, dropping items the catalog does not know
    fn enrich(&self, ranked: Vec<ScoredCandidate>) -> Vec<Recommendation> {
        let selected = ranked.len();
        let recommendations: Vec<Recommendation> = ranked
            .into_iter()
            .filter_map(|candidate| {
                let entry = self.catalog.lookup(candidate.item_id)?;
                Some(Recommendation {
                    item_id: candidate.item_id,
                    title: entry.title.clone(),
                    genres: entry.genres.clone(),
                    overview: entry.overview.clone(),
                    poster_path: entry.poster_path.clone(),
                    release_date: entry.release_date.clone(),
                    average_rating: entry.average_rating,
                    total_ratings: entry.total_ratings,
                    score: candidate.score,
                })
            })
            .collect();

        if recommendations.len() < selected {
            warn!(
                "Dropped {} of {} selected items with no catalog entry",
                selected - recommendations.len(),
                selected
            );
        }
        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{EntityKind, InteractionRecord, MetadataEntry};
    use ranking::{Normalization, ScoringMode};

    // ============================================================================
    // Test Fixtures
    // ============================================================================

    /// Two users, five items. User 1 rated items 1 and 2.
    ///
    /// Raw scores for user 1: item 3 -> 4.5, item 4 -> 3.5, item 5 -> 4.0
    fn build_test_dataset(catalog_ids: &[ItemId]) -> Arc<Dataset> {
        let model = LatentFactorModel::new(
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![
                vec![1.0, 0.0],
                vec![0.8, 0.0],
                vec![1.5, 0.0],
                vec![0.5, 0.0],
                vec![1.0, 0.0],
            ],
            vec![0.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.0, 0.0],
            3.0,
        )
        .unwrap();
        let users = IdentifierMap::from_ordered(EntityKind::User, vec![1, 2]).unwrap();
        let items = IdentifierMap::from_ordered(EntityKind::Item, vec![1, 2, 3, 4, 5]).unwrap();

        let titles = ["Toy Story", "Jumanji", "Heat", "Casino", "Babe"];
        let catalog = MetadataCatalog::from_entries(catalog_ids.iter().map(|&id| {
            MetadataEntry::new(id, titles[id as usize - 1])
                .with_genres(vec!["Drama".to_string()])
        }));
        let interactions = InteractionIndex::from_records(&[
            InteractionRecord::rated(1, 1, 5.0),
            InteractionRecord::rated(1, 2, 3.0),
        ]);

        Arc::new(Dataset::new(model, users, items, catalog, interactions).unwrap())
    }

    fn service(config: ServiceConfig) -> RecommendationService {
        RecommendationService::new(build_test_dataset(&[1, 2, 3, 4, 5]), config).unwrap()
    }

    fn ids(recommendations: &[Recommendation]) -> Vec<ItemId> {
        recommendations.iter().map(|r| r.item_id).collect()
    }

    // ============================================================================
    // Tests
    // ============================================================================

    #[test]
    fn test_end_to_end_top_two() {
        let service = service(ServiceConfig::default());
        let recommendations = service.get_recommendations(1, 2).unwrap();

        assert_eq!(ids(&recommendations), vec![3, 5]);
        assert_eq!(recommendations[0].title, "Heat");
        assert_eq!(recommendations[0].score, 4.5);
        assert_eq!(recommendations[1].score, 4.0);
    }

    #[test]
    fn test_unknown_user_is_empty() {
        let service = service(ServiceConfig::default());
        assert!(service.get_recommendations(999, 10).unwrap().is_empty());
    }

    #[test]
    fn test_knows_user() {
        let service = service(ServiceConfig::default());

        assert!(service.knows_user(1));
        assert!(service.knows_user(2));
        assert!(!service.knows_user(999));
    }

    #[test]
    fn test_never_recommends_seen_items() {
        let service = service(ServiceConfig::default());
        let recommendations = service.get_recommendations(1, 10).unwrap();

        assert_eq!(ids(&recommendations), vec![3, 5, 4]);
        let seen = service.interactions();
        assert!(recommendations.iter().all(|r| !seen.has_seen(1, r.item_id)));
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let service = service(ServiceConfig::default());
        let first = service.get_recommendations(2, 5).unwrap();
        let second = service.get_recommendations(2, 5).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_metadata_is_not_backfilled() {
        // Item 5 ranks second but has no catalog entry.
        let dataset = build_test_dataset(&[1, 2, 3, 4]);
        let service = RecommendationService::new(dataset, ServiceConfig::default()).unwrap();

        let recommendations = service.get_recommendations(1, 2).unwrap();
        assert_eq!(ids(&recommendations), vec![3]);
    }

    #[test]
    fn test_replace_interactions_keeps_old_snapshot() {
        let service = service(ServiceConfig::default());
        let before = service.interactions();

        service.replace_interactions(InteractionIndex::from_records(&[InteractionRecord::new(
            1, 3,
        )]));

        assert!(before.has_seen(1, 1));
        assert!(!service.interactions().has_seen(1, 1));
        let recommendations = service.get_recommendations(1, 2).unwrap();
        assert_eq!(ids(&recommendations), vec![1, 5]);
    }

    #[test]
    fn test_reload_interactions_from_tables() {
        struct Tables;
        impl TableLoader for Tables {
            fn load_catalog(&self) -> data_loader::Result<MetadataCatalog> {
                Ok(MetadataCatalog::new())
            }
            fn load_interactions(&self) -> data_loader::Result<Vec<InteractionRecord>> {
                Ok(vec![InteractionRecord::new(2, 1), InteractionRecord::new(2, 3)])
            }
        }

        let service = service(ServiceConfig::default());
        assert_eq!(service.reload_interactions(&Tables).unwrap(), 2);
        assert_eq!(service.interactions().interaction_count(2), 2);
        assert_eq!(service.interactions().interaction_count(1), 0);
    }

    #[test]
    fn test_minimum_interactions_gate() {
        let config = ServiceConfig {
            min_interactions_for_scoring: 3,
            ..ServiceConfig::default()
        };
        let service = service(config);
        assert!(service.get_recommendations(1, 10).unwrap().is_empty());
    }

    #[test]
    fn test_normalized_scores() {
        let config = ServiceConfig {
            normalization: Normalization::rating_scale(),
            scoring_mode: ScoringMode::Parallel { min_batch: 1 },
            ..ServiceConfig::default()
        };
        let service = service(config);
        let recommendations = service.get_recommendations(1, 3).unwrap();

        let scores: Vec<f64> = recommendations.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ServiceConfig {
            max_limit: 0,
            ..ServiceConfig::default()
        };
        let result = RecommendationService::new(build_test_dataset(&[]), config);
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_rejects_map_model_drift() {
        let dataset = build_test_dataset(&[]);
        let items = IdentifierMap::from_ordered(EntityKind::Item, vec![1, 2, 3]).unwrap();

        let result = RecommendationService::from_parts(
            Arc::clone(&dataset.model),
            Arc::clone(&dataset.user_ids),
            Arc::new(items),
            Arc::clone(&dataset.catalog),
            Arc::clone(&dataset.interactions),
            ServiceConfig::default(),
        );
        assert!(matches!(result, Err(ServiceError::Load(DataLoadError::MalformedModel(_)))));
    }

    #[test]
    fn test_recommendation_wire_format() {
        let service = service(ServiceConfig::default());
        let recommendations = service.get_recommendations(1, 1).unwrap();
        let json = serde_json::to_value(&recommendations[0]).unwrap();

        assert_eq!(json["itemId"], 3);
        assert_eq!(json["title"], "Heat");
        assert_eq!(json["totalRatings"], 0);
        assert!(json["posterPath"].is_null());
        assert!(json.get("item_id").is_none());
    }
}
