//! Free-text issue matching against nearby reports
//!
//! A thinner read path than the coverage analysis: classify the user's
//! description, then describe how many nearby reports look like it.
//! Nothing here is cached.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::geo::Coordinate;
use crate::models::{IssueType, Report, Severity};
use crate::{CoverageError, Result};

/// Longest description accepted
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Ordered keyword table; first issue type with a hit wins. Keywords match
/// whole words; multi-word entries match consecutive words.
const ISSUE_KEYWORDS: &[(IssueType, &[&str])] = &[
    (
        IssueType::BillingIssues,
        &[
            "bill", "bills", "billed", "billing", "charge", "charged", "charges",
            "overcharge", "overcharged", "invoice", "refund",
        ],
    ),
    (
        IssueType::DroppedCalls,
        &[
            "drop", "drops", "dropped", "dropping", "disconnect", "disconnects",
            "disconnected", "call cut", "calls cut",
        ],
    ),
    (
        IssueType::NoSignal,
        &[
            "no signal", "no service", "no bars", "zero bars", "sos only", "cant connect",
            "cannot connect",
        ],
    ),
    (
        IssueType::SlowData,
        &[
            "slow", "slower", "lag", "laggy", "lagging", "buffer", "buffering", "speed",
            "speeds", "latency", "mbps",
        ],
    ),
    (
        IssueType::NetworkOutage,
        &["outage", "outages", "down", "offline", "not working", "dead"],
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRequest {
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub provider: Option<String>,
}

impl IssueRequest {
    pub fn validate(&self) -> Result<()> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(CoverageError::Validation(
                "Issue description must not be empty".to_string(),
            ));
        }
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(CoverageError::Validation(format!(
                "Issue description longer than {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }
        Ok(())
    }
}

/// How concentrated similar reports are around the location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePattern {
    None,
    Isolated,
    Localized,
    Widespread,
}

impl IssuePattern {
    pub fn from_matches(count: usize) -> Self {
        match count {
            0 => Self::None,
            1..=2 => Self::Isolated,
            3..=5 => Self::Localized,
            _ => Self::Widespread,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Isolated => "isolated",
            Self::Localized => "localized",
            Self::Widespread => "widespread",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIssueCount {
    pub provider: String,
    pub reports: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueAnalysis {
    pub location: Coordinate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub detected_issue_type: Option<IssueType>,
    pub nearby_reports: usize,
    pub matching_reports: usize,
    pub affected_providers: Vec<ProviderIssueCount>,
    pub nearest_match_km: Option<f64>,
    pub dominant_severity: Option<Severity>,
    pub pattern: IssuePattern,
    pub summary: String,
}

/// Keyword classification of a free-text complaint
pub fn classify_issue(description: &str) -> Option<IssueType> {
    let words = tokenize(description);
    ISSUE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| contains_phrase(&words, k)))
        .map(|(issue, _)| *issue)
}

/// Lowercase words split on anything non-alphanumeric; apostrophes are
/// dropped so "can't" reads as "cant"
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let parts: Vec<&str> = phrase.split_whitespace().collect();
    if parts.is_empty() || parts.len() > words.len() {
        return false;
    }
    words
        .windows(parts.len())
        .any(|window| window.iter().zip(&parts).all(|(w, p)| w == p))
}

/// Match a described issue against the reports around `location`
pub fn assess_issue(
    request: &IssueRequest,
    location: Coordinate,
    radius_km: f64,
    reports: &[Report],
) -> IssueAnalysis {
    let detected = classify_issue(&request.description);
    let provider = request
        .provider
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case(crate::providers::AUTO_PROVIDER));

    let matching: Vec<&Report> = reports
        .iter()
        .filter(|r| provider.map_or(true, |p| r.matches_provider(p)))
        .filter(|r| detected.map_or(true, |issue| r.issue_type == issue))
        .collect();

    let mut per_provider: BTreeMap<&str, usize> = BTreeMap::new();
    for r in &matching {
        *per_provider.entry(r.provider.as_str()).or_default() += 1;
    }
    let mut affected_providers: Vec<ProviderIssueCount> = per_provider
        .into_iter()
        .map(|(provider, reports)| ProviderIssueCount {
            provider: provider.to_string(),
            reports,
        })
        .collect();
    affected_providers.sort_by(|a, b| b.reports.cmp(&a.reports).then(a.provider.cmp(&b.provider)));

    let nearest_match_km = matching
        .iter()
        .map(|r| location.distance_km(&r.coordinates))
        .min_by(|a, b| a.total_cmp(b));

    let mut severity_counts: BTreeMap<Severity, usize> = BTreeMap::new();
    for r in &matching {
        *severity_counts.entry(r.severity).or_default() += 1;
    }
    // Ties resolve to the higher severity (BTreeMap iterates low → high)
    let dominant_severity = severity_counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(severity, _)| severity);

    let pattern = IssuePattern::from_matches(matching.len());
    let summary = summarize(
        detected,
        matching.len(),
        radius_km,
        nearest_match_km,
        pattern,
        &affected_providers,
    );

    IssueAnalysis {
        location,
        provider: provider.map(str::to_string),
        detected_issue_type: detected,
        nearby_reports: reports.len(),
        matching_reports: matching.len(),
        affected_providers,
        nearest_match_km,
        dominant_severity,
        pattern,
        summary,
    }
}

fn summarize(
    detected: Option<IssueType>,
    matches: usize,
    radius_km: f64,
    nearest_km: Option<f64>,
    pattern: IssuePattern,
    providers: &[ProviderIssueCount],
) -> String {
    let kind = detected.map(|i| i.as_str()).unwrap_or("issue");
    if matches == 0 {
        return format!(
            "No similar {} reports within {:.0} km; this may be specific to your device or account",
            kind, radius_km
        );
    }

    let names: Vec<&str> = providers.iter().map(|p| p.provider.as_str()).collect();
    format!(
        "{} similar {} report{} within {:.0} km (nearest {:.1} km); {} pattern affecting {}",
        matches,
        kind,
        if matches == 1 { "" } else { "s" },
        radius_km,
        nearest_km.unwrap_or(0.0),
        pattern.as_str(),
        names.join(", ")
    )
}
