//! Coverage Analysis Engine
//!
//! Ranks mobile and broadband providers around a point by aggregating
//! crowd-sourced outage reports inside a radius and time window.
//!
//! # Pipeline
//!
//! ```text
//! request → cache lookup → (miss) provider resolver → report source
//!         → per-provider scorer fan-out → sort/partition → cache store
//! ```
//!
//! | Stage | Module | Notes |
//! |-------|--------|-------|
//! | Distance | [`geo`] | Haversine on a 6371 km sphere |
//! | Reports | [`reports`] | `ReportSource` trait, seeded simulation |
//! | Scoring | [`scorer`], [`ai_scorer`] | AI strategy with heuristic fallback |
//! | Providers | [`providers`] | Ordered bounding-box table |
//! | Cache | [`cache`] | 30 min TTL, lazy expiry, capacity bound |
//! | Aggregation | [`engine`] | Validation, fan-out, sort, stamp |
//!
//! # Heuristic Scoring Model
//!
//! ```text
//! S = Σ w(severity)        w = {high: 3, medium: 2, low: 1}
//! coverage    = max(0, 100 - 5·S)
//! reliability = max(1, 5 - ⌊S / 5⌋)
//! ```

use thiserror::Error;

pub mod ai_scorer;
pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod geo;
pub mod issue;
pub mod models;
pub mod providers;
pub mod reports;
pub mod scorer;

pub use cache::{cache_key, CacheStats, CoverageCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::CoverageEngine;
pub use geo::{haversine_km, Coordinate};
pub use models::{
    CoverageAnalysis, IssueType, Location, LocationCoverage, Recommendation, Report, ServiceType,
    Severity,
};
pub use reports::{ReportSource, SimulatedReportSource};
pub use scorer::{CoverageScorer, FallbackScorer, HeuristicScorer};

/// Label attached to every `LocationCoverage` produced by the engine
pub const DATA_PERIOD: &str = "Last 30 days";

/// Request-level failures. Provider-level scoring failures never reach this type.
#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Report source failed: {0}")]
    ReportSource(#[from] reports::ReportSourceError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Analysis exceeded deadline of {0} ms")]
    DeadlineExceeded(u64),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoverageError {
    /// Whether the caller caused the failure (maps to HTTP 400)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, CoverageError>;

/// Validate a latitude/longitude pair before any work is done
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<Coordinate> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(CoverageError::Validation(
            "Coordinates must be finite numbers".to_string(),
        ));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(CoverageError::Validation(format!(
            "Latitude {} out of range [-90, 90]",
            lat
        )));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(CoverageError::Validation(format!(
            "Longitude {} out of range [-180, 180]",
            lng
        )));
    }
    Ok(Coordinate::new(lat, lng))
}
