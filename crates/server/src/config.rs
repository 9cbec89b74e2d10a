//! Service and server configuration.
//!
//! `ServiceConfig` holds the knobs the recommendation service reads on every
//! request. `ServerSettings` is what the `reel-recs-server` binary parses
//! from its command line, falling back to `REEL_RECS_*` environment
//! variables.

use clap::Args;
use data_loader::FileSystemSource;
use ranking::{Normalization, RankError, ScoringMode};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("Invalid limits: default {default_limit} must be within [1, {max_limit}]")]
    InvalidLimits { default_limit: usize, max_limit: usize },

    #[error("Invalid normalization: {0}")]
    InvalidNormalization(#[from] RankError),

    #[error("Both --normalize-min and --normalize-max are required, got only {0}")]
    IncompleteRange(&'static str),
}

/// Per-request behavior of the recommendation service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Results returned when a request names no limit
    pub default_limit: usize,
    /// Largest limit the HTTP boundary accepts
    pub max_limit: usize,
    /// Users with fewer recorded interactions get no ranking; 0 disables the gate
    pub min_interactions_for_scoring: usize,
    pub normalization: Normalization,
    pub scoring_mode: ScoringMode,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 50,
            min_interactions_for_scoring: 0,
            normalization: Normalization::None,
            scoring_mode: ScoringMode::Sequential,
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_limit == 0 || self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(ConfigError::InvalidLimits {
                default_limit: self.default_limit,
                max_limit: self.max_limit,
            });
        }
        self.normalization.validate()?;
        Ok(())
    }
}

/// Command-line and environment settings for the server binary
#[derive(Debug, Clone, Args)]
pub struct ServerSettings {
    /// Interface to bind
    #[arg(long, env = "REEL_RECS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "REEL_RECS_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory holding the model arrays and identifier maps
    #[arg(long, env = "REEL_RECS_MODEL_DIR", default_value = "backend/data")]
    pub model_dir: PathBuf,

    /// Directory holding filtered_movies.csv and filtered_ratings.csv
    #[arg(long, env = "REEL_RECS_PROCESSED_DIR", default_value = "backend/data/processed")]
    pub processed_dir: PathBuf,

    /// Allowed CORS origins, comma separated; any origin when empty
    #[arg(
        long,
        env = "REEL_RECS_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://localhost:8000"
    )]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "REEL_RECS_DEFAULT_LIMIT", default_value_t = 10)]
    pub default_limit: usize,

    #[arg(long, env = "REEL_RECS_MAX_LIMIT", default_value_t = 50)]
    pub max_limit: usize,

    /// Minimum recorded interactions before a user is ranked (0 = off)
    #[arg(long, env = "REEL_RECS_MIN_INTERACTIONS", default_value_t = 0)]
    pub min_interactions: usize,

    /// Lower bound of the min-max score rescale
    #[arg(long, env = "REEL_RECS_NORMALIZE_MIN", allow_negative_numbers = true)]
    pub normalize_min: Option<f64>,

    /// Upper bound of the min-max score rescale
    #[arg(long, env = "REEL_RECS_NORMALIZE_MAX", allow_negative_numbers = true)]
    pub normalize_max: Option<f64>,

    /// Score candidates on the rayon pool once a request has this many
    #[arg(long, env = "REEL_RECS_PARALLEL_MIN_BATCH")]
    pub parallel_min_batch: Option<usize>,

    /// Re-read the ratings table every N seconds (off when unset)
    #[arg(long, env = "REEL_RECS_INTERACTIONS_REFRESH_SECS")]
    pub interactions_refresh_secs: Option<u64>,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }

    pub fn source(&self) -> FileSystemSource {
        FileSystemSource::new(&self.model_dir, &self.processed_dir)
    }

    /// Origins with surrounding whitespace and empty entries removed
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }

    /// Build and validate the service configuration these settings describe
    pub fn service_config(&self) -> Result<ServiceConfig, ConfigError> {
        let normalization = match (self.normalize_min, self.normalize_max) {
            (None, None) => Normalization::None,
            (Some(lo), Some(hi)) => Normalization::min_max(lo, hi)?,
            (Some(_), None) => return Err(ConfigError::IncompleteRange("--normalize-min")),
            (None, Some(_)) => return Err(ConfigError::IncompleteRange("--normalize-max")),
        };
        let scoring_mode = match self.parallel_min_batch {
            Some(min_batch) => ScoringMode::Parallel { min_batch },
            None => ScoringMode::Sequential,
        };

        let config = ServiceConfig {
            default_limit: self.default_limit,
            max_limit: self.max_limit,
            min_interactions_for_scoring: self.min_interactions,
            normalization,
            scoring_mode,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: ServerSettings,
    }

    fn parse(args: &[&str]) -> ServerSettings {
        let argv = std::iter::once("reel-recs-server").chain(args.iter().copied());
        TestCli::parse_from(argv).settings
    }

    #[test]
    fn test_service_config_defaults() {
        let config = ServiceConfig::default();

        assert_eq!(config.default_limit, 10);
        assert_eq!(config.max_limit, 50);
        assert_eq!(config.min_interactions_for_scoring, 0);
        assert_eq!(config.normalization, Normalization::None);
        assert_eq!(config.scoring_mode, ScoringMode::Sequential);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_service_config_from_partial_json() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{"max_limit": 20, "normalization": {"kind": "min_max", "lo": 1.0, "hi": 5.0}}"#,
        )
        .unwrap();

        assert_eq!(config.max_limit, 20);
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.normalization, Normalization::rating_scale());
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let config = ServiceConfig {
            default_limit: 60,
            ..ServiceConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimits { .. })));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = parse(&[]);

        assert_eq!(settings.port, 8000);
        assert_eq!(settings.model_dir, PathBuf::from("backend/data"));
        assert_eq!(settings.processed_dir, PathBuf::from("backend/data/processed"));
        assert_eq!(settings.cors_origins().len(), 2);
        assert_eq!(settings.service_config().unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_settings_normalization_and_parallel() {
        let settings = parse(&[
            "--normalize-min",
            "1",
            "--normalize-max",
            "5",
            "--parallel-min-batch",
            "512",
        ]);
        let config = settings.service_config().unwrap();

        assert_eq!(config.normalization, Normalization::rating_scale());
        assert_eq!(config.scoring_mode, ScoringMode::Parallel { min_batch: 512 });
    }

    #[test]
    fn test_settings_reject_half_range() {
        let settings = parse(&["--normalize-min", "1"]);
        assert_eq!(
            settings.service_config(),
            Err(ConfigError::IncompleteRange("--normalize-min"))
        );
    }

    #[test]
    fn test_settings_reject_inverted_range() {
        let settings = parse(&["--normalize-min", "5", "--normalize-max", "1"]);
        assert!(matches!(
            settings.service_config(),
            Err(ConfigError::InvalidNormalization(_))
        ));
    }

    #[test]
    fn test_socket_addr() {
        let settings = parse(&["--host", "127.0.0.1", "--port", "9000"]);
        assert_eq!(settings.socket_addr().unwrap().port(), 9000);

        let settings = parse(&["--host", "not a host"]);
        assert!(settings.socket_addr().is_err());
    }
}
