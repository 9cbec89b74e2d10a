//! # Data Loader Crate
//!
//! Loads the trained latent-factor model and the tables around it into
//! immutable in-memory stores.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (ids, MetadataEntry, InteractionRecord, Dataset)
//! - **id_map**: Bijective external id <-> dense index maps
//! - **model**: Factor matrices, bias terms and the prediction formula
//! - **catalog**: Item metadata lookups
//! - **interactions**: Items already seen, per user
//! - **npy / parser**: Readers for the persisted arrays, tables and mappings
//! - **index**: Loader traits and `Dataset::load`
//! - **error**: Error types for loading and lookups
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Dataset, FileSystemSource};
//!
//! let source = FileSystemSource::from_model_dir("backend/data");
//! let dataset = Dataset::load(&source, &source, &source)?;
//!
//! let user = dataset.user_ids.to_internal(1)?;
//! let item = dataset.item_ids.to_internal(1193)?;
//! println!("predicted rating: {:.2}", dataset.model.predict(user, item)?);
//! ```

// Public modules
pub mod error;
pub mod types;
pub mod id_map;
pub mod model;
pub mod catalog;
pub mod interactions;
pub mod npy;
pub mod parser;
pub mod index;

// Re-export commonly used types for convenience
pub use catalog::{MetadataCatalog, split_genres};
pub use error::{DataLoadError, LookupError, Result};
pub use id_map::IdentifierMap;
pub use index::{FileSystemSource, MappingLoader, ModelLoader, TableLoader};
pub use interactions::InteractionIndex;
pub use model::{LatentFactorModel, ScoreBreakdown};
pub use types::{
    // Type aliases
    UserId,
    ItemId,
    // Core types
    EntityKind,
    MetadataEntry,
    InteractionRecord,
    Dataset,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_dataset() -> Result<Dataset> {
        let model = LatentFactorModel::new(
            vec![vec![1.0]],
            vec![vec![2.0], vec![3.0]],
            vec![0.0],
            vec![0.0, 0.0],
            1.0,
        )?;
        let users = IdentifierMap::from_ordered(EntityKind::User, vec![1])?;
        let items = IdentifierMap::from_ordered(EntityKind::Item, vec![100, 200])?;
        let catalog = MetadataCatalog::from_entries(vec![MetadataEntry::new(100, "A")]);
        let interactions = InteractionIndex::from_records(&[InteractionRecord::new(1, 100)]);
        Dataset::new(model, users, items, catalog, interactions)
    }

    #[test]
    fn test_dataset_creation() {
        let dataset = tiny_dataset().unwrap();
        let (users, items, entries, interactions) = dataset.counts();

        assert_eq!(users, 1);
        assert_eq!(items, 2);
        assert_eq!(entries, 1);
        assert_eq!(interactions, 1);
    }

    #[test]
    fn test_dataset_rejects_inconsistent_maps() {
        let model = LatentFactorModel::new(vec![vec![1.0]], vec![vec![2.0]], vec![0.0], vec![0.0], 0.0)
            .unwrap();
        let users = IdentifierMap::from_ordered(EntityKind::User, vec![1, 2]).unwrap();
        let items = IdentifierMap::from_ordered(EntityKind::Item, vec![1]).unwrap();

        let result = Dataset::new(
            model,
            users,
            items,
            MetadataCatalog::new(),
            InteractionIndex::new(),
        );
        assert!(matches!(result, Err(DataLoadError::MalformedModel(_))));
    }

    #[test]
    fn test_empty_queries() {
        let dataset = tiny_dataset().unwrap();

        // Querying non-existent data should return None, errors or empty sets
        assert!(dataset.catalog.lookup(200).is_none());
        assert!(dataset.user_ids.to_internal(2).is_err());
        assert!(dataset.interactions.seen_items(2).is_empty());
    }
}
