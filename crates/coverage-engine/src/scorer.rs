//! Provider scoring
//!
//! Two interchangeable strategies sit behind [`CoverageScorer`]:
//! - [`crate::ai_scorer::AiScorer`] asks a language model for a
//!   schema-constrained assessment.
//! - [`HeuristicScorer`] applies the deterministic severity-weighted formula.
//!
//! [`FallbackScorer`] composes them: the primary strategy runs under a
//! per-call timeout and any error drops to the heuristic for that provider
//! only. It never fails.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::geo::Coordinate;
use crate::models::{CoverageAnalysis, IssueType, Recommendation, Report, ServiceType, Severity};

/// Confidence attached to every heuristic result
pub const HEURISTIC_CONFIDENCE: f64 = 0.6;

/// Coverage points lost per unit of weighted severity
const SCORE_PENALTY_PER_SEVERITY: u32 = 5;

/// Weighted severity per lost reliability star
const SEVERITY_PER_STAR: u32 = 5;

#[derive(Error, Debug, Clone)]
pub enum ScoringError {
    #[error("AI scoring is not configured")]
    NotConfigured,
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Schema violation: {0}")]
    SchemaViolation(String),
    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

/// Everything a strategy needs to score one provider
#[derive(Debug, Clone, Copy)]
pub struct ScoringRequest<'a> {
    pub provider: &'a str,
    pub service_type: ServiceType,
    /// All reports near the location; strategies filter by provider
    pub reports: &'a [Report],
    pub location: Coordinate,
}

impl<'a> ScoringRequest<'a> {
    pub fn new(
        provider: &'a str,
        service_type: ServiceType,
        reports: &'a [Report],
        location: Coordinate,
    ) -> Self {
        Self {
            provider,
            service_type,
            reports,
            location,
        }
    }

    /// Reports attributed to this provider
    pub fn provider_reports(&self) -> Vec<&'a Report> {
        self.reports
            .iter()
            .filter(|r| r.matches_provider(self.provider))
            .collect()
    }
}

#[async_trait]
pub trait CoverageScorer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<CoverageAnalysis, ScoringError>;
}

/// Which strategy produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringStrategy {
    Ai,
    Heuristic,
}

/// Deterministic severity-weighted scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    /// Infallible scoring entry point
    pub fn analyze(&self, request: &ScoringRequest<'_>) -> CoverageAnalysis {
        let reports = request.provider_reports();
        let total_severity = total_severity(&reports);
        let coverage_score = coverage_score_for(total_severity);

        let last_major_outage = reports
            .iter()
            .filter(|r| r.severity == Severity::High)
            .map(|r| r.timestamp)
            .max();

        CoverageAnalysis {
            provider: request.provider.to_string(),
            service_type: request.service_type,
            coverage_score,
            reliability_rating: reliability_for(total_severity),
            recent_issues: reports.len() as u32,
            issue_summary: summarize(&reports),
            recommendation: Recommendation::from_score(coverage_score),
            confidence_score: HEURISTIC_CONFIDENCE,
            last_major_outage,
        }
    }
}

#[async_trait]
impl CoverageScorer for HeuristicScorer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<CoverageAnalysis, ScoringError> {
        Ok(self.analyze(request))
    }
}

/// Σ severity weight over the given reports
pub fn total_severity(reports: &[&Report]) -> u32 {
    reports.iter().map(|r| r.severity.weight()).sum()
}

/// max(0, 100 - 5·S)
pub fn coverage_score_for(total_severity: u32) -> u8 {
    100u32.saturating_sub(total_severity.saturating_mul(SCORE_PENALTY_PER_SEVERITY)) as u8
}

/// max(1, 5 - ⌊S / 5⌋)
pub fn reliability_for(total_severity: u32) -> u8 {
    5u32.saturating_sub(total_severity / SEVERITY_PER_STAR).max(1) as u8
}

fn summarize(reports: &[&Report]) -> String {
    if reports.is_empty() {
        return "No recent issues reported in this area".to_string();
    }
    let kinds: BTreeSet<IssueType> = reports.iter().map(|r| r.issue_type).collect();
    let kinds: Vec<&str> = kinds.iter().map(IssueType::as_str).collect();
    let noun = if reports.len() == 1 { "report" } else { "reports" };
    format!("{} {} nearby: {}", reports.len(), noun, kinds.join(", "))
}

/// Primary strategy guarded by a timeout, heuristic on any failure
pub struct FallbackScorer {
    primary: Option<Arc<dyn CoverageScorer>>,
    fallback: HeuristicScorer,
    timeout: Duration,
}

impl FallbackScorer {
    pub fn new(primary: Arc<dyn CoverageScorer>, timeout: Duration) -> Self {
        Self {
            primary: Some(primary),
            fallback: HeuristicScorer,
            timeout,
        }
    }

    /// No primary strategy: every provider gets the heuristic
    pub fn heuristic_only() -> Self {
        Self {
            primary: None,
            fallback: HeuristicScorer,
            timeout: Duration::ZERO,
        }
    }

    /// Score one provider. Never fails; degrades confidence instead.
    pub async fn score(&self, request: &ScoringRequest<'_>) -> (CoverageAnalysis, ScoringStrategy) {
        let Some(primary) = &self.primary else {
            return (self.fallback.analyze(request), ScoringStrategy::Heuristic);
        };

        let outcome = match tokio::time::timeout(self.timeout, primary.score(request)).await {
            Ok(result) => result,
            Err(_) => Err(ScoringError::Timeout(self.timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(analysis) => {
                debug!(
                    provider = request.provider,
                    strategy = primary.name(),
                    score = analysis.coverage_score,
                    "Scored provider"
                );
                (analysis, ScoringStrategy::Ai)
            }
            Err(ScoringError::NotConfigured) => {
                (self.fallback.analyze(request), ScoringStrategy::Heuristic)
            }
            Err(e) => {
                warn!(
                    provider = request.provider,
                    strategy = primary.name(),
                    error = %e,
                    "Primary scoring failed, using heuristic fallback"
                );
                (self.fallback.analyze(request), ScoringStrategy::Heuristic)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use proptest::prelude::*;

    const TORONTO: Coordinate = Coordinate { lat: 43.6532, lng: -79.3832 };

    fn report(provider: &str, issue: IssueType, severity: Severity) -> Report {
        Report {
            id: format!("{}-{:?}-{:?}", provider, issue, severity),
            provider: provider.to_string(),
            coordinates: TORONTO,
            issue_type: issue,
            severity,
            timestamp: Utc::now(),
            user_reports: 1,
            description: "test".to_string(),
        }
    }

    fn reports_with_severities(provider: &str, severities: &[Severity]) -> Vec<Report> {
        severities
            .iter()
            .map(|s| report(provider, IssueType::SlowData, *s))
            .collect()
    }

    #[test]
    fn test_no_reports_scores_perfect() {
        let req = ScoringRequest::new("Rogers", ServiceType::Mobile, &[], TORONTO);
        let analysis = HeuristicScorer.analyze(&req);
        assert_eq!(analysis.coverage_score, 100);
        assert_eq!(analysis.reliability_rating, 5);
        assert_eq!(analysis.recent_issues, 0);
        assert_eq!(analysis.recommendation, Recommendation::Excellent);
        assert_eq!(analysis.confidence_score, HEURISTIC_CONFIDENCE);
        assert!(analysis.last_major_outage.is_none());
    }

    #[test]
    fn test_heuristic_formula() {
        // high + medium + low = 6 → 100 - 30 = 70, 5 - 1 = 4
        let reports = reports_with_severities(
            "Rogers",
            &[Severity::High, Severity::Medium, Severity::Low],
        );
        let req = ScoringRequest::new("Rogers", ServiceType::Mobile, &reports, TORONTO);
        let analysis = HeuristicScorer.analyze(&req);
        assert_eq!(analysis.coverage_score, 70);
        assert_eq!(analysis.reliability_rating, 4);
        assert_eq!(analysis.recent_issues, 3);
        assert_eq!(analysis.recommendation, Recommendation::Good);
        assert!(analysis.last_major_outage.is_some());
    }

    #[test]
    fn test_score_and_rating_floors() {
        let reports = reports_with_severities("Bell", &[Severity::High; 12]);
        let req = ScoringRequest::new("Bell", ServiceType::Mobile, &reports, TORONTO);
        let analysis = HeuristicScorer.analyze(&req);
        assert_eq!(analysis.coverage_score, 0);
        assert_eq!(analysis.reliability_rating, 1);
        assert_eq!(analysis.recommendation, Recommendation::Poor);
    }

    #[test]
    fn test_filters_to_target_provider() {
        let mut reports = reports_with_severities("Rogers Wireless", &[Severity::High]);
        reports.push(report("Telus", IssueType::NoSignal, Severity::High));
        reports.push(report("Telus", IssueType::NoSignal, Severity::High));

        let req = ScoringRequest::new("Rogers", ServiceType::Mobile, &reports, TORONTO);
        let analysis = HeuristicScorer.analyze(&req);
        assert_eq!(analysis.recent_issues, 1);
        assert_eq!(analysis.coverage_score, 85);
        assert!(analysis.issue_summary.contains("slow_data"));
        assert!(!analysis.issue_summary.contains("no_signal"));
    }

    #[test]
    fn test_summary_lists_distinct_issue_types() {
        let reports = vec![
            report("Bell", IssueType::DroppedCalls, Severity::Low),
            report("Bell", IssueType::DroppedCalls, Severity::Low),
            report("Bell", IssueType::NetworkOutage, Severity::Medium),
        ];
        let req = ScoringRequest::new("Bell", ServiceType::Mobile, &reports, TORONTO);
        let summary = HeuristicScorer.analyze(&req).issue_summary;
        assert_eq!(summary, "3 reports nearby: network_outage, dropped_calls");
    }

    #[test]
    fn test_last_major_outage_is_newest_high_severity() {
        let now = Utc::now();
        let mut old = report("Bell", IssueType::NetworkOutage, Severity::High);
        old.timestamp = now - ChronoDuration::days(10);
        let mut recent = report("Bell", IssueType::NetworkOutage, Severity::High);
        recent.timestamp = now - ChronoDuration::days(2);
        let mut newest_low = report("Bell", IssueType::SlowData, Severity::Low);
        newest_low.timestamp = now;

        let reports = vec![old, recent.clone(), newest_low];
        let req = ScoringRequest::new("Bell", ServiceType::Mobile, &reports, TORONTO);
        let analysis = HeuristicScorer.analyze(&req);
        assert_eq!(analysis.last_major_outage, Some(recent.timestamp));
    }

    struct FailingScorer;

    #[async_trait]
    impl CoverageScorer for FailingScorer {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn score(&self, _request: &ScoringRequest<'_>) -> Result<CoverageAnalysis, ScoringError> {
            Err(ScoringError::ApiError("503".to_string()))
        }
    }

    struct SlowScorer;

    #[async_trait]
    impl CoverageScorer for SlowScorer {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn score(&self, request: &ScoringRequest<'_>) -> Result<CoverageAnalysis, ScoringError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(HeuristicScorer.analyze(request))
        }
    }

    struct ConfidentScorer;

    #[async_trait]
    impl CoverageScorer for ConfidentScorer {
        fn name(&self) -> &'static str {
            "confident"
        }

        async fn score(&self, request: &ScoringRequest<'_>) -> Result<CoverageAnalysis, ScoringError> {
            let mut analysis = HeuristicScorer.analyze(request);
            analysis.confidence_score = 0.9;
            Ok(analysis)
        }
    }

    #[tokio::test]
    async fn test_fallback_on_error() {
        let scorer = FallbackScorer::new(Arc::new(FailingScorer), Duration::from_secs(1));
        let req = ScoringRequest::new("Rogers", ServiceType::Mobile, &[], TORONTO);
        let (analysis, strategy) = scorer.score(&req).await;
        assert_eq!(strategy, ScoringStrategy::Heuristic);
        assert_eq!(analysis.confidence_score, HEURISTIC_CONFIDENCE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_on_timeout() {
        let scorer = FallbackScorer::new(Arc::new(SlowScorer), Duration::from_millis(50));
        let req = ScoringRequest::new("Rogers", ServiceType::Mobile, &[], TORONTO);
        let (analysis, strategy) = scorer.score(&req).await;
        assert_eq!(strategy, ScoringStrategy::Heuristic);
        assert_eq!(analysis.confidence_score, HEURISTIC_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_primary_result_passes_through() {
        let scorer = FallbackScorer::new(Arc::new(ConfidentScorer), Duration::from_secs(1));
        let req = ScoringRequest::new("Rogers", ServiceType::Mobile, &[], TORONTO);
        let (analysis, strategy) = scorer.score(&req).await;
        assert_eq!(strategy, ScoringStrategy::Ai);
        assert_eq!(analysis.confidence_score, 0.9);
    }

    #[tokio::test]
    async fn test_heuristic_only() {
        let scorer = FallbackScorer::heuristic_only();
        let req = ScoringRequest::new("Rogers", ServiceType::Broadband, &[], TORONTO);
        let (analysis, strategy) = scorer.score(&req).await;
        assert_eq!(strategy, ScoringStrategy::Heuristic);
        assert_eq!(analysis.service_type, ServiceType::Broadband);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        #[test]
        fn fuzz_heuristic_monotonic(a in 0u32..200, b in 0u32..200) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(coverage_score_for(hi) <= coverage_score_for(lo));
            prop_assert!(reliability_for(hi) <= reliability_for(lo));
        }

        #[test]
        fn fuzz_heuristic_ranges(severities in proptest::collection::vec(0usize..3, 0..40)) {
            let severities: Vec<Severity> = severities.into_iter().map(|i| Severity::ALL[i]).collect();
            let reports = reports_with_severities("Telus", &severities);
            let req = ScoringRequest::new("Telus", ServiceType::Mobile, &reports, TORONTO);
            let analysis = HeuristicScorer.analyze(&req);
            prop_assert!(analysis.coverage_score <= 100);
            prop_assert!((1..=5).contains(&analysis.reliability_rating));
            prop_assert_eq!(analysis.recommendation, Recommendation::from_score(analysis.coverage_score));
            prop_assert_eq!(analysis.recent_issues as usize, severities.len());
        }
    }
}
