//! Report, analysis and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geo::Coordinate;

/// Category of a user complaint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    NetworkOutage,
    SlowData,
    NoSignal,
    DroppedCalls,
    BillingIssues,
}

impl IssueType {
    pub const ALL: [IssueType; 5] = [
        IssueType::NetworkOutage,
        IssueType::SlowData,
        IssueType::NoSignal,
        IssueType::DroppedCalls,
        IssueType::BillingIssues,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkOutage => "network_outage",
            Self::SlowData => "slow_data",
            Self::NoSignal => "no_signal",
            Self::DroppedCalls => "dropped_calls",
            Self::BillingIssues => "billing_issues",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    /// Heuristic weight: high = 3, medium = 2, low = 1
    pub fn weight(&self) -> u32 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A single crowd-sourced complaint near the query point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub provider: String,
    pub coordinates: Coordinate,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    /// Number of users behind this report (always >= 1)
    pub user_reports: u32,
    pub description: String,
}

impl Report {
    /// Case-insensitive substring match in either direction so
    /// "Rogers" and "Rogers Wireless" refer to the same provider.
    pub fn matches_provider(&self, provider: &str) -> bool {
        provider_names_match(&self.provider, provider)
    }
}

pub fn provider_names_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Mobile,
    Broadband,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Broadband => "broadband",
        }
    }
}

/// Coarse verdict derived from `coverage_score`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Recommendation {
    /// >= 90 excellent, 70..90 good, 50..70 fair, < 50 poor
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::Excellent,
            70..=89 => Self::Good,
            50..=69 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

/// Per-provider result of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageAnalysis {
    pub provider: String,
    pub service_type: ServiceType,
    /// 0-100
    pub coverage_score: u8,
    /// 1-5
    pub reliability_rating: u8,
    pub recent_issues: u32,
    pub issue_summary: String,
    pub recommendation: Recommendation,
    /// 0-1, lower for the heuristic fallback than for an AI pass
    pub confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_major_outage: Option<DateTime<Utc>>,
}

/// Query location echoed back in the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// The unit of response and of caching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCoverage {
    pub location: Location,
    /// Descending by `coverage_score`
    pub mobile_providers: Vec<CoverageAnalysis>,
    /// Descending by `coverage_score`
    pub broadband_providers: Vec<CoverageAnalysis>,
    pub analysis_timestamp: DateTime<Utc>,
    pub data_period: String,
}
