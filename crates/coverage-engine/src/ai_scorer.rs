//! AI-assisted coverage scoring
//!
//! Sends the provider's nearby reports to an OpenAI-compatible
//! chat-completions endpoint and requests a JSON response constrained by
//! [`response_schema`]. Transport errors, non-2xx statuses, unparseable
//! content and out-of-range values all surface as [`ScoringError`] so the
//! caller can fall back to the heuristic.
//!
//! # Usage
//!
//! ```rust,ignore
//! let scorer = AiScorer::new(AiScorerConfig::with_api_key("sk-..."))?;
//! let analysis = scorer.score(&request).await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::models::{CoverageAnalysis, Recommendation, Report, ServiceType};
use crate::scorer::{CoverageScorer, ScoringError, ScoringRequest};

pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";

/// Reports included in a prompt, newest first
const MAX_PROMPT_REPORTS: usize = 50;

/// AI backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiScorerConfig {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Transport-level timeout in seconds; the fallback scorer applies its
    /// own tighter per-provider deadline on top
    pub timeout_sec: u64,
}

impl AiScorerConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_AI_MODEL.to_string(),
            timeout_sec: 30,
        }
    }
}

/// Chat-completions response (only the fields we read)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Model output as constrained by the response schema
#[derive(Debug, Clone, Deserialize)]
pub struct AiAssessment {
    pub coverage_score: i64,
    pub reliability_rating: i64,
    pub recent_issues: i64,
    pub issue_summary: String,
    pub recommendation: Recommendation,
    pub confidence_score: f64,
    #[serde(default)]
    pub last_major_outage: Option<String>,
}

impl AiAssessment {
    /// Range-check and convert. `recommendation` is re-derived from the
    /// score so the threshold table holds regardless of what the model said.
    pub fn into_analysis(
        self,
        provider: &str,
        service_type: ServiceType,
    ) -> Result<CoverageAnalysis, ScoringError> {
        if !(0..=100).contains(&self.coverage_score) {
            return Err(ScoringError::SchemaViolation(format!(
                "coverage_score {} outside 0-100",
                self.coverage_score
            )));
        }
        if !(1..=5).contains(&self.reliability_rating) {
            return Err(ScoringError::SchemaViolation(format!(
                "reliability_rating {} outside 1-5",
                self.reliability_rating
            )));
        }
        if self.recent_issues < 0 || self.recent_issues > i64::from(u32::MAX) {
            return Err(ScoringError::SchemaViolation(format!(
                "recent_issues {} invalid",
                self.recent_issues
            )));
        }
        if !self.confidence_score.is_finite() || !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(ScoringError::SchemaViolation(format!(
                "confidence_score {} outside 0-1",
                self.confidence_score
            )));
        }

        let coverage_score = self.coverage_score as u8;
        let recommendation = Recommendation::from_score(coverage_score);
        if recommendation != self.recommendation {
            debug!(
                provider,
                model = ?self.recommendation,
                derived = ?recommendation,
                "Overriding model recommendation"
            );
        }

        // Blank is treated like null; anything else must be RFC 3339
        let last_major_outage = match self
            .last_major_outage
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| {
                        ScoringError::SchemaViolation(format!(
                            "last_major_outage {:?} is not RFC 3339: {}",
                            raw, e
                        ))
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(CoverageAnalysis {
            provider: provider.to_string(),
            service_type,
            coverage_score,
            reliability_rating: self.reliability_rating as u8,
            recent_issues: self.recent_issues as u32,
            issue_summary: self.issue_summary,
            recommendation,
            confidence_score: self.confidence_score,
            last_major_outage,
        })
    }
}

/// Parse the message content returned by the model
pub fn parse_assessment(content: &str) -> Result<AiAssessment, ScoringError> {
    serde_json::from_str(content.trim()).map_err(|e| ScoringError::ParseError(e.to_string()))
}

/// JSON schema the model must follow
pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": [
            "coverage_score",
            "reliability_rating",
            "recent_issues",
            "issue_summary",
            "recommendation",
            "confidence_score",
            "last_major_outage"
        ],
        "properties": {
            "coverage_score": { "type": "integer", "minimum": 0, "maximum": 100 },
            "reliability_rating": { "type": "integer", "minimum": 1, "maximum": 5 },
            "recent_issues": { "type": "integer", "minimum": 0 },
            "issue_summary": { "type": "string" },
            "recommendation": { "type": "string", "enum": ["excellent", "good", "fair", "poor"] },
            "confidence_score": { "type": "number", "minimum": 0, "maximum": 1 },
            "last_major_outage": {
                "type": ["string", "null"],
                "description": "RFC 3339 timestamp of the most recent major outage, or null"
            }
        }
    })
}

fn service_context(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::Mobile => {
            "This is a MOBILE carrier. Weigh no_signal, dropped_calls and network_outage \
             most heavily; slow_data matters for mobile data quality; billing_issues do \
             not affect coverage."
        }
        ServiceType::Broadband => {
            "This is a home BROADBAND provider. Weigh network_outage and slow_data most \
             heavily; no_signal and dropped_calls are rarely relevant to fixed lines; \
             billing_issues do not affect coverage."
        }
    }
}

/// Build the (system, user) prompt pair for one provider
pub fn build_prompt(request: &ScoringRequest<'_>) -> (String, String) {
    let mut reports: Vec<&Report> = request.provider_reports();
    reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    reports.truncate(MAX_PROMPT_REPORTS);

    let system = "You are a telecom network reliability analyst. You estimate how reliable \
                  a provider's service is near a location from crowd-sourced outage reports. \
                  Respond only with JSON matching the supplied schema."
        .to_string();

    let report_lines: Vec<String> = reports
        .iter()
        .map(|r| {
            format!(
                "- {} | {} | severity={} | users={} | {:.5},{:.5} | {}",
                r.timestamp.to_rfc3339(),
                r.issue_type,
                r.severity.as_str(),
                r.user_reports,
                r.coordinates.lat,
                r.coordinates.lng,
                r.description
            )
        })
        .collect();

    let report_block = if report_lines.is_empty() {
        "(no reports for this provider)".to_string()
    } else {
        report_lines.join("\n")
    };

    let user = format!(
        "Provider: {provider}\n\
         Service type: {service}\n\
         Location: {lat:.4}, {lng:.4}\n\
         {context}\n\n\
         Reports from the last 30 days ({count}):\n{report_block}\n\n\
         Scoring guidelines:\n\
         - coverage_score 0-100: 100 means no meaningful issues.\n\
         - reliability_rating 1-5 stars.\n\
         - recommendation: excellent (>=90), good (70-89), fair (50-69), poor (<50).\n\
         - recent_issues: number of relevant reports.\n\
         - confidence_score 0-1: lower when there are few reports.\n\
         - last_major_outage: timestamp of the latest high-severity outage, or null.",
        provider = request.provider,
        service = request.service_type.as_str(),
        lat = request.location.lat,
        lng = request.location.lng,
        context = service_context(request.service_type),
        count = reports.len(),
    );

    (system, user)
}

/// Language-model backed scorer
pub struct AiScorer {
    config: AiScorerConfig,
    client: reqwest::Client,
}

impl AiScorer {
    pub fn new(config: AiScorerConfig) -> Result<Self, ScoringError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_sec))
            .build()
            .map_err(|e| ScoringError::RequestFailed(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Use a caller-built client (custom proxy, TLS or pooling settings)
    pub fn with_client(config: AiScorerConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, request: &ScoringRequest<'_>) -> serde_json::Value {
        let (system, user) = build_prompt(request);
        json!({
            "model": self.config.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "coverage_analysis",
                    "strict": true,
                    "schema": response_schema()
                }
            }
        })
    }
}

#[async_trait]
impl CoverageScorer for AiScorer {
    fn name(&self) -> &'static str {
        "ai"
    }

    async fn score(&self, request: &ScoringRequest<'_>) -> Result<CoverageAnalysis, ScoringError> {
        if self.config.api_key.trim().is_empty() {
            return Err(ScoringError::NotConfigured);
        }

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScoringError::Timeout(self.config.timeout_sec * 1000)
                } else {
                    ScoringError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ScoringError::ApiError(format!(
                "Model endpoint returned status: {}",
                response.status()
            )));
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ScoringError::ParseError(e.to_string()))?;

        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ScoringError::ParseError("empty completion".to_string()))?;

        parse_assessment(&content)?.into_analysis(request.provider, request.service_type)
    }
}
