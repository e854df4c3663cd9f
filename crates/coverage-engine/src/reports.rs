//! Outage report sources
//!
//! [`ReportSource`] is the seam for a real crowd-report ingester. The
//! bundled [`SimulatedReportSource`] synthesizes a plausible neighbourhood
//! of complaints and can be seeded for reproducible runs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::geo::Coordinate;
use crate::models::{IssueType, Report, Severity};
use crate::providers::known_providers;

/// Simulated report count range (inclusive)
pub const MIN_SIMULATED_REPORTS: usize = 5;
pub const MAX_SIMULATED_REPORTS: usize = 25;

#[derive(Error, Debug, Clone)]
pub enum ReportSourceError {
    #[error("Report feed unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed report feed: {0}")]
    Malformed(String),
    #[error("Report window of {0} days is out of range")]
    WindowOutOfRange(u32),
}

#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Reports within `radius_km` of `center` from the last `days_back` days.
    /// Every returned report must satisfy the radius bound.
    async fn fetch_reports(
        &self,
        center: Coordinate,
        radius_km: f64,
        days_back: u32,
    ) -> Result<Vec<Report>, ReportSourceError>;
}

/// Development stand-in for a live report feed
pub struct SimulatedReportSource {
    rng: Mutex<StdRng>,
    providers: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl SimulatedReportSource {
    /// Entropy-seeded source using the full provider catalog
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Reproducible source: the same seed yields the same report sequence
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            providers: known_providers().into_iter().map(String::from).collect(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Restrict the simulated provider pool
    pub fn with_providers(mut self, providers: Vec<String>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn generate(
        &self,
        center: Coordinate,
        radius_km: f64,
        days_back: u32,
    ) -> Result<Vec<Report>, ReportSourceError> {
        if self.providers.is_empty() {
            return Err(ReportSourceError::Unavailable(
                "no providers configured for simulation".to_string(),
            ));
        }

        let now = self.clock.now();
        let window_secs = i64::from(days_back.max(1)) * 86_400;
        if now.checked_sub_signed(Duration::seconds(window_secs)).is_none() {
            return Err(ReportSourceError::WindowOutOfRange(days_back));
        }
        let radius_km = radius_km.max(0.0);

        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let count = rng.gen_range(MIN_SIMULATED_REPORTS..=MAX_SIMULATED_REPORTS);

        let mut reports = Vec::with_capacity(count);
        for _ in 0..count {
            let provider = self
                .providers
                .choose(&mut *rng)
                .cloned()
                .unwrap_or_default();
            let issue_type = *IssueType::ALL.choose(&mut *rng).unwrap_or(&IssueType::NoSignal);
            let severity = *Severity::ALL.choose(&mut *rng).unwrap_or(&Severity::Low);
            let bearing = rng.gen_range(0.0..360.0);
            let distance = rng.gen_range(0.0..=radius_km);
            let age_secs = rng.gen_range(0..window_secs);
            let user_reports = rng.gen_range(1..=50u32);

            let coordinates = place_within(center, bearing, distance, radius_km);
            let timestamp: DateTime<Utc> = now - Duration::seconds(age_secs);

            reports.push(Report {
                id: uuid::Uuid::new_v4().to_string(),
                description: describe(issue_type, severity, &provider),
                provider,
                coordinates,
                issue_type,
                severity,
                timestamp,
                user_reports,
            });
        }

        debug!(
            lat = center.lat,
            lng = center.lng,
            radius_km,
            count = reports.len(),
            "Simulated outage reports"
        );
        Ok(reports)
    }
}

impl Default for SimulatedReportSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportSource for SimulatedReportSource {
    async fn fetch_reports(
        &self,
        center: Coordinate,
        radius_km: f64,
        days_back: u32,
    ) -> Result<Vec<Report>, ReportSourceError> {
        self.generate(center, radius_km, days_back)
    }
}

/// Place a point at `bearing`/`distance` from `center`, pulling it inwards
/// until floating-point error can no longer push it past `radius_km`.
fn place_within(center: Coordinate, bearing: f64, distance: f64, radius_km: f64) -> Coordinate {
    let mut distance = distance.min(radius_km);
    loop {
        let point = center.destination(bearing, distance);
        if center.distance_km(&point) <= radius_km || distance == 0.0 {
            return if distance == 0.0 { center } else { point };
        }
        distance *= 0.999;
        if distance < 1e-9 {
            distance = 0.0;
        }
    }
}

fn describe(issue_type: IssueType, severity: Severity, provider: &str) -> String {
    let what = match issue_type {
        IssueType::NetworkOutage => "Complete network outage",
        IssueType::SlowData => "Very slow mobile data speeds",
        IssueType::NoSignal => "No signal in the area",
        IssueType::DroppedCalls => "Calls dropping repeatedly",
        IssueType::BillingIssues => "Unexpected charges on bill",
    };
    format!("{} with {} ({} severity)", what, provider, severity.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use proptest::prelude::*;

    const TORONTO: Coordinate = Coordinate { lat: 43.6532, lng: -79.3832 };

    #[tokio::test]
    async fn test_count_in_range() {
        let source = SimulatedReportSource::seeded(7);
        for _ in 0..20 {
            let reports = source.fetch_reports(TORONTO, 10.0, 30).await.unwrap();
            assert!(reports.len() >= MIN_SIMULATED_REPORTS);
            assert!(reports.len() <= MAX_SIMULATED_REPORTS);
        }
    }

    #[tokio::test]
    async fn test_reports_fall_inside_window() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let source = SimulatedReportSource::seeded(11).with_clock(clock);

        let reports = source.fetch_reports(TORONTO, 5.0, 30).await.unwrap();
        for r in &reports {
            assert!(r.timestamp <= start);
            assert!(r.timestamp > start - Duration::days(30));
            assert!(r.user_reports >= 1);
            assert!(!r.description.is_empty());
        }
    }

    #[tokio::test]
    async fn test_oversized_window_is_error() {
        let source = SimulatedReportSource::seeded(3);
        let err = source
            .fetch_reports(TORONTO, 10.0, 4_000_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportSourceError::WindowOutOfRange(4_000_000_000)));
    }

    #[tokio::test]
    async fn test_seeded_sources_agree() {
        let start = Utc::now();
        let a = SimulatedReportSource::seeded(42).with_clock(Arc::new(ManualClock::new(start)));
        let b = SimulatedReportSource::seeded(42).with_clock(Arc::new(ManualClock::new(start)));

        let ra = a.fetch_reports(TORONTO, 10.0, 30).await.unwrap();
        let rb = b.fetch_reports(TORONTO, 10.0, 30).await.unwrap();

        assert_eq!(ra.len(), rb.len());
        for (x, y) in ra.iter().zip(rb.iter()) {
            assert_eq!(x.provider, y.provider);
            assert_eq!(x.issue_type, y.issue_type);
            assert_eq!(x.severity, y.severity);
            assert_eq!(x.coordinates, y.coordinates);
            assert_eq!(x.timestamp, y.timestamp);
        }
    }

    #[tokio::test]
    async fn test_provider_pool_respected() {
        let source = SimulatedReportSource::seeded(3)
            .with_providers(vec!["Rogers".to_string(), "Bell".to_string()]);
        let reports = source.fetch_reports(TORONTO, 10.0, 30).await.unwrap();
        assert!(reports
            .iter()
            .all(|r| r.provider == "Rogers" || r.provider == "Bell"));
    }

    #[tokio::test]
    async fn test_empty_provider_pool_is_error() {
        let source = SimulatedReportSource::seeded(3).with_providers(Vec::new());
        assert!(source.fetch_reports(TORONTO, 10.0, 30).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_radius_collapses_to_center() {
        let source = SimulatedReportSource::seeded(5);
        let reports = source.fetch_reports(TORONTO, 0.0, 30).await.unwrap();
        assert!(reports.iter().all(|r| r.coordinates == TORONTO));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn fuzz_reports_within_radius(
            lat in -85.0f64..=85.0,
            lng in -180.0f64..=180.0,
            radius in 0.0f64..=200.0,
            seed in any::<u64>(),
        ) {
            let center = Coordinate::new(lat, lng);
            let source = SimulatedReportSource::seeded(seed);
            let reports = source.generate(center, radius, 30).unwrap();
            for r in &reports {
                let d = center.distance_km(&r.coordinates);
                prop_assert!(d <= radius, "report at {} km exceeds radius {}", d, radius);
            }
        }
    }
}
