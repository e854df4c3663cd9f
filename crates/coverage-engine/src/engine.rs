//! Coverage aggregation
//!
//! Orchestrates one analysis: validate → cache → resolve providers → fetch
//! reports once → score every provider concurrently → sort → stamp → store.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::ai_scorer::AiScorer;
use crate::cache::{cache_key, CacheStats, CoverageCache};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::geo::Coordinate;
use crate::issue::{assess_issue, IssueAnalysis, IssueRequest};
use crate::models::{CoverageAnalysis, Location, LocationCoverage, ServiceType};
use crate::providers::{self, explicit_provider, AUTO_PROVIDER};
use crate::reports::{ReportSource, SimulatedReportSource};
use crate::scorer::{FallbackScorer, ScoringRequest, ScoringStrategy};
use crate::{validate_coordinates, CoverageError, Result, DATA_PERIOD};

pub struct CoverageEngine {
    config: EngineConfig,
    reports: Arc<dyn ReportSource>,
    scorer: FallbackScorer,
    cache: CoverageCache,
    clock: Arc<dyn Clock>,
}

impl CoverageEngine {
    pub fn new(
        config: EngineConfig,
        reports: Arc<dyn ReportSource>,
        scorer: FallbackScorer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = CoverageCache::new(config.cache_ttl(), config.cache_max_entries);
        Self {
            config,
            reports,
            scorer,
            cache,
            clock,
        }
    }

    /// Wire the default collaborators: simulated reports, AI scoring when
    /// configured, wall clock.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let reports = match config.report_seed {
            Some(seed) => SimulatedReportSource::seeded(seed),
            None => SimulatedReportSource::new(),
        }
        .with_clock(clock.clone());

        let scorer = match &config.ai {
            Some(ai) => {
                let ai = AiScorer::new(ai.clone())
                    .map_err(|e| CoverageError::Internal(format!("AI scorer setup: {}", e)))?;
                FallbackScorer::new(Arc::new(ai), config.scorer_timeout())
            }
            None => FallbackScorer::heuristic_only(),
        };

        Ok(Self::new(config, Arc::new(reports), scorer, clock))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &CoverageCache {
        &self.cache
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats(self.clock.now()).await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
        info!("Coverage cache cleared");
    }

    /// Ranked coverage for every provider resolved at (lat, lng)
    pub async fn analyze(
        &self,
        lat: f64,
        lng: f64,
        address: Option<String>,
        provider: Option<&str>,
    ) -> Result<LocationCoverage> {
        let location = validate_coordinates(lat, lng)?;
        let key = cache_key(lat, lng, provider);

        if let Some(hit) = self.cache.get(&key, self.clock.now()).await {
            return Ok(hit);
        }

        // Concurrent misses for the same key queue here; later arrivals
        // find the first one's result in the cache.
        let _guard = self.cache.lock_key(&key).await;
        if let Some(hit) = self.cache.get(&key, self.clock.now()).await {
            debug!(key = %key, "Coalesced with concurrent analysis");
            return Ok(hit);
        }

        debug!(key = %key, "Cache miss");
        let deadline = self.config.request_timeout();
        let coverage = match tokio::time::timeout(
            deadline,
            self.compute(location, address, provider),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                error!(
                    lat,
                    lng,
                    provider = provider.unwrap_or(AUTO_PROVIDER),
                    stage = "aggregate",
                    "Coverage analysis exceeded deadline"
                );
                return Err(CoverageError::DeadlineExceeded(deadline.as_millis() as u64));
            }
        };

        self.cache.set(key, coverage.clone(), self.clock.now()).await;
        Ok(coverage)
    }

    async fn compute(
        &self,
        location: Coordinate,
        address: Option<String>,
        provider: Option<&str>,
    ) -> Result<LocationCoverage> {
        let resolved = providers::resolve(&location, provider);

        let reports = self
            .reports
            .fetch_reports(location, self.config.radius_km, self.config.days_back)
            .await
            .map_err(|e| {
                error!(
                    lat = location.lat,
                    lng = location.lng,
                    provider = provider.unwrap_or(AUTO_PROVIDER),
                    stage = "fetch_reports",
                    error = %e,
                    "Report source failed"
                );
                CoverageError::from(e)
            })?;

        // Reports are shared read-only across every provider's scorer
        let pairs = resolved.pairs();
        let scored = join_all(pairs.iter().map(|(name, service_type)| {
            let request = ScoringRequest::new(name, *service_type, &reports, location);
            async move { self.scorer.score(&request).await }
        }))
        .await;

        let ai_count = scored
            .iter()
            .filter(|(_, strategy)| *strategy == ScoringStrategy::Ai)
            .count();

        let (mut mobile, mut broadband): (Vec<CoverageAnalysis>, Vec<CoverageAnalysis>) = scored
            .into_iter()
            .map(|(analysis, _)| analysis)
            .partition(|a| a.service_type == ServiceType::Mobile);

        sort_by_score(&mut mobile);
        sort_by_score(&mut broadband);

        info!(
            lat = location.lat,
            lng = location.lng,
            provider = explicit_provider(provider).unwrap_or(AUTO_PROVIDER),
            reports = reports.len(),
            mobile = mobile.len(),
            broadband = broadband.len(),
            ai_scored = ai_count,
            "Coverage analysis complete"
        );

        Ok(LocationCoverage {
            location: Location {
                lat: location.lat,
                lng: location.lng,
                address: address.filter(|a| !a.trim().is_empty()),
            },
            mobile_providers: mobile,
            broadband_providers: broadband,
            analysis_timestamp: self.clock.now(),
            data_period: data_period(self.config.days_back),
        })
    }

    /// Pattern-match a free-text complaint against nearby reports (uncached)
    pub async fn analyze_issue(&self, request: &IssueRequest) -> Result<IssueAnalysis> {
        let location = validate_coordinates(request.lat, request.lng)?;
        request.validate()?;

        let reports = self
            .reports
            .fetch_reports(location, self.config.radius_km, self.config.days_back)
            .await
            .map_err(|e| {
                error!(
                    lat = location.lat,
                    lng = location.lng,
                    stage = "fetch_reports",
                    error = %e,
                    "Report source failed during issue analysis"
                );
                CoverageError::from(e)
            })?;

        Ok(assess_issue(request, location, self.config.radius_km, &reports))
    }
}

/// Descending by coverage score; stable for equal scores
fn sort_by_score(analyses: &mut [CoverageAnalysis]) {
    analyses.sort_by(|a, b| b.coverage_score.cmp(&a.coverage_score));
}

fn data_period(days_back: u32) -> String {
    if days_back == 30 {
        DATA_PERIOD.to_string()
    } else {
        format!("Last {} days", days_back)
    }
}
