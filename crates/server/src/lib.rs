//! Server crate for the ReelRecs recommendation engine.
//!
//! This crate contains the recommendation service that ties the loaded
//! stores to the ranker, its configuration, and the HTTP routes exposing it.

pub mod config;
pub mod http;
pub mod orchestrator;

pub use config::{ConfigError, ServerSettings, ServiceConfig};
pub use http::{router, AppState};
pub use orchestrator::{Recommendation, RecommendationService, ServiceError};
