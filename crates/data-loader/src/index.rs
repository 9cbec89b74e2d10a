//! Loading the persisted model, mappings and tables into a `Dataset`.
//!
//! Each persisted artifact is produced by a swappable loader trait, so the
//! stores never depend on a storage format. `FileSystemSource` implements
//! all three against the training job's output directory:
//!
//! ```text
//! <model_dir>/model_P.npy  model_Q.npy  model_bu.npy  model_bi.npy  model_mu.npy
//! <model_dir>/user_id_map.json  movie_id_map.json
//! <processed_dir>/filtered_movies.csv  filtered_ratings.csv
//! ```

use crate::catalog::MetadataCatalog;
use crate::error::{DataLoadError, Result};
use crate::id_map::IdentifierMap;
use crate::interactions::InteractionIndex;
use crate::model::LatentFactorModel;
use crate::npy::{self, NpyArray};
use crate::parser;
use crate::types::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Produces the latent-factor model
pub trait ModelLoader: Send + Sync {
    fn load_model(&self) -> Result<LatentFactorModel>;
}

/// Produces the (user, item) identifier maps
pub trait MappingLoader: Send + Sync {
    fn load_mappings(&self) -> Result<(IdentifierMap, IdentifierMap)>;
}

/// Produces the catalog and the interaction records
pub trait TableLoader: Send + Sync {
    fn load_catalog(&self) -> Result<MetadataCatalog>;
    fn load_interactions(&self) -> Result<Vec<InteractionRecord>>;
}

/// Loads every artifact from the training job's output directories
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    pub model_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl FileSystemSource {
    pub fn new(model_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    /// Default layout: tables under `<model_dir>/processed`
    pub fn from_model_dir(model_dir: impl Into<PathBuf>) -> Self {
        let model_dir = model_dir.into();
        let processed_dir = model_dir.join("processed");
        Self::new(model_dir, processed_dir)
    }

    fn model_file(&self, name: &str) -> PathBuf {
        self.model_dir.join(name)
    }
}

impl ModelLoader for FileSystemSource {
    fn load_model(&self) -> Result<LatentFactorModel> {
        let p = npy::read_npy(&self.model_file("model_P.npy"))?;
        let q = npy::read_npy(&self.model_file("model_Q.npy"))?;
        let bu = npy::read_npy(&self.model_file("model_bu.npy"))?;
        let bi = npy::read_npy(&self.model_file("model_bi.npy"))?;
        let mu = npy::read_npy(&self.model_file("model_mu.npy"))?;

        let (_, user_dim) = expect_matrix(&p, "model_P.npy")?;
        let (_, item_dim) = expect_matrix(&q, "model_Q.npy")?;
        if user_dim != item_dim {
            return Err(DataLoadError::MalformedModel(format!(
                "model_P.npy has {user_dim} factors per user but model_Q.npy has {item_dim} per item"
            )));
        }
        let global_bias = *mu.data.first().ok_or_else(|| {
            DataLoadError::MalformedModel("model_mu.npy is empty".to_string())
        })?;

        debug!(
            "Read factor matrices P{:?} Q{:?}, {} user and {} item biases",
            p.shape,
            q.shape,
            bu.data.len(),
            bi.data.len()
        );
        LatentFactorModel::from_flat(user_dim, p.data, q.data, bu.data, bi.data, global_bias)
    }
}

impl MappingLoader for FileSystemSource {
    fn load_mappings(&self) -> Result<(IdentifierMap, IdentifierMap)> {
        let users = parser::parse_id_map(&self.model_file("user_id_map.json"), EntityKind::User)?;
        let items = parser::parse_id_map(&self.model_file("movie_id_map.json"), EntityKind::Item)?;
        Ok((users, items))
    }
}

impl TableLoader for FileSystemSource {
    fn load_catalog(&self) -> Result<MetadataCatalog> {
        let movies = parser::parse_movies(&self.processed_dir.join("filtered_movies.csv"))?;
        Ok(MetadataCatalog::from_entries(movies))
    }

    fn load_interactions(&self) -> Result<Vec<InteractionRecord>> {
        parser::parse_ratings(&self.processed_dir.join("filtered_ratings.csv"))
    }
}

fn expect_matrix(array: &NpyArray, name: &str) -> Result<(usize, usize)> {
    array.matrix_dims().ok_or_else(|| {
        DataLoadError::MalformedModel(format!(
            "{name} must be two-dimensional, found shape {:?}",
            array.shape
        ))
    })
}

impl Dataset {
    /// Load every store from the given loaders.
    ///
    /// Steps:
    /// 1. Load the model, the mappings and the tables in parallel
    /// 2. Cross-check model rows against the identifier maps
    /// 3. Build the interaction index
    /// 4. Fill rating statistics the catalog rows lack
    ///
    /// Any structural problem is returned as an error; the caller is expected
    /// to refuse to start rather than serve from partial data.
    pub fn load<M, I, T>(models: &M, mappings: &I, tables: &T) -> Result<Self>
    where
        M: ModelLoader + ?Sized,
        I: MappingLoader + ?Sized,
        T: TableLoader + ?Sized,
    {
        let start = Instant::now();

        let ((model, maps), (catalog, records)) = rayon::join(
            || rayon::join(|| models.load_model(), || mappings.load_mappings()),
            || rayon::join(|| tables.load_catalog(), || tables.load_interactions()),
        );
        let model = model?;
        let (user_ids, item_ids) = maps?;
        let mut catalog = catalog?;
        let records = records?;

        info!(
            "Loaded model with {} users x {} items (k = {}), {} catalog entries, {} interactions",
            model.num_users(),
            model.num_items(),
            model.dim(),
            catalog.len(),
            records.len()
        );

        let interactions = InteractionIndex::from_records(&records);
        catalog.fill_rating_stats(&records);

        let dataset = Dataset::new(model, user_ids, item_ids, catalog, interactions)?;
        info!("Dataset ready in {:.2?}", start.elapsed());
        Ok(dataset)
    }

    /// Load from the training job's directory layout
    pub fn load_from_dirs(model_dir: &Path, processed_dir: &Path) -> Result<Self> {
        let source = FileSystemSource::new(model_dir, processed_dir);
        Self::load(&source, &source, &source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npy::tests::npy_bytes;
    use std::fs;

    fn write_npy(dir: &Path, name: &str, shape: &[usize], data: &[f64]) {
        fs::write(dir.join(name), npy_bytes(shape, data)).unwrap();
    }

    /// Two users, three items, k = 2, written in the training job's layout
    fn write_fixture(dir: &Path) {
        write_npy(dir, "model_P.npy", &[2, 2], &[1.0, 0.0, 0.0, 1.0]);
        write_npy(dir, "model_Q.npy", &[3, 2], &[0.5, 0.1, 0.2, 0.9, 0.3, 0.3]);
        write_npy(dir, "model_bu.npy", &[2], &[0.1, -0.1]);
        write_npy(dir, "model_bi.npy", &[3], &[0.0, 0.2, -0.2]);
        write_npy(dir, "model_mu.npy", &[1], &[3.5]);
        fs::write(dir.join("user_id_map.json"), r#"{"10": 0, "20": 1}"#).unwrap();
        fs::write(dir.join("movie_id_map.json"), r#"{"1": 0, "2": 1, "3": 2}"#).unwrap();

        let processed = dir.join("processed");
        fs::create_dir_all(&processed).unwrap();
        fs::write(
            processed.join("filtered_movies.csv"),
            "movieId,title,genres\n1,One,Drama\n2,Two,Comedy|Drama\n3,Three,\n",
        )
        .unwrap();
        fs::write(
            processed.join("filtered_ratings.csv"),
            "userId,movieId,rating,timestamp\n10,1,4.0,1\n20,1,2.0,2\n20,3,5.0,3\n",
        )
        .unwrap();
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let source = FileSystemSource::from_model_dir(dir.path());
        let dataset = Dataset::load(&source, &source, &source).unwrap();

        assert_eq!(dataset.counts(), (2, 3, 3, 3));
        assert_eq!(dataset.model.dim(), 2);
        // 3.5 + 0.1 + 0.2 + (1.0 * 0.2 + 0.0 * 0.9)
        let user = dataset.user_ids.to_internal(10).unwrap();
        let item = dataset.item_ids.to_internal(2).unwrap();
        assert_eq!(dataset.model.predict(user, item).unwrap(), 3.5 + 0.1 + 0.2 + 0.2);

        assert_eq!(dataset.interactions.interaction_count(20), 2);
        assert_eq!(dataset.catalog.lookup(1).unwrap().average_rating, Some(3.0));
        assert_eq!(dataset.catalog.lookup(2).unwrap().total_ratings, 0);
    }

    #[test]
    fn test_load_catalog_keeps_first_duplicate_row() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(
            dir.path().join("processed/filtered_movies.csv"),
            "movieId,title\n1,First\n2,Two\n1,Second\n",
        )
        .unwrap();

        let source = FileSystemSource::from_model_dir(dir.path());
        let catalog = source.load_catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup(1).unwrap().title, "First");
    }

    #[test]
    fn test_load_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        write_npy(dir.path(), "model_Q.npy", &[2, 3], &[0.0; 6]);

        let source = FileSystemSource::from_model_dir(dir.path());
        let result = Dataset::load(&source, &source, &source);
        assert!(matches!(result, Err(DataLoadError::MalformedModel(_))));
    }

    #[test]
    fn test_load_rejects_map_model_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(dir.path().join("movie_id_map.json"), r#"{"1": 0, "2": 1}"#).unwrap();

        let source = FileSystemSource::from_model_dir(dir.path());
        let result = Dataset::load(&source, &source, &source);
        assert!(matches!(result, Err(DataLoadError::MalformedModel(_))));
    }

    #[test]
    fn test_load_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::remove_file(dir.path().join("model_mu.npy")).unwrap();

        let result = Dataset::load_from_dirs(dir.path(), &dir.path().join("processed"));
        assert!(matches!(result, Err(DataLoadError::FileNotFound { .. })));
    }
}
