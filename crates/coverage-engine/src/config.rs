//! Engine configuration
//!
//! Defaults: 10 km radius, 30-day window, 30-minute cache. `from_env`
//! overrides them from `COVERAGE_*` variables.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::ai_scorer::{AiScorerConfig, DEFAULT_AI_BASE_URL, DEFAULT_AI_MODEL};
use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL_SECS};

/// Longest report window (10 years)
pub const MAX_DAYS_BACK: u32 = 3650;

/// Longest cache TTL (7 days)
pub const MAX_CACHE_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Report search radius in km
    pub radius_km: f64,
    /// Report window in days
    pub days_back: u32,
    /// Cache TTL in seconds
    pub cache_ttl_secs: i64,
    /// Cache capacity bound
    pub cache_max_entries: usize,
    /// Per-provider deadline for the AI strategy (ms)
    pub scorer_timeout_ms: u64,
    /// Overall deadline for one analysis (ms)
    pub request_timeout_ms: u64,
    /// Seed for the simulated report source; entropy when unset
    pub report_seed: Option<u64>,
    /// AI strategy; heuristic only when unset
    pub ai: Option<AiScorerConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            radius_km: 10.0,
            days_back: 30,
            cache_ttl_secs: DEFAULT_TTL_SECS,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            scorer_timeout_ms: 5_000,
            request_timeout_ms: 15_000,
            report_seed: None,
            ai: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup (environment, file, test map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let radius_km = parse_or(&lookup, "COVERAGE_RADIUS_KM", defaults.radius_km)?;

        let ai = lookup("COVERAGE_AI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .map(|api_key| -> Result<AiScorerConfig, ConfigError> {
                let mut ai = AiScorerConfig::with_api_key(api_key);
                ai.base_url = lookup("COVERAGE_AI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string());
                ai.model =
                    lookup("COVERAGE_AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string());
                ai.timeout_sec = parse_or(&lookup, "COVERAGE_AI_HTTP_TIMEOUT_SECS", ai.timeout_sec)?;
                Ok(ai)
            })
            .transpose()?;

        let config = Self {
            radius_km,
            days_back: parse_or(&lookup, "COVERAGE_DAYS_BACK", defaults.days_back)?,
            cache_ttl_secs: parse_or(&lookup, "COVERAGE_CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            cache_max_entries: parse_or(
                &lookup,
                "COVERAGE_CACHE_MAX_ENTRIES",
                defaults.cache_max_entries,
            )?,
            scorer_timeout_ms: parse_or(
                &lookup,
                "COVERAGE_SCORER_TIMEOUT_MS",
                defaults.scorer_timeout_ms,
            )?,
            request_timeout_ms: parse_or(
                &lookup,
                "COVERAGE_REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
            )?,
            report_seed: match lookup("COVERAGE_REPORT_SEED") {
                Some(raw) => Some(parse_value("COVERAGE_REPORT_SEED", &raw)?),
                None => None,
            },
            ai,
        };
        config.validate()?;
        Ok(config)
    }

    /// Range-check every value that later feeds time arithmetic
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(invalid("COVERAGE_RADIUS_KM", self.radius_km, "must be a positive number"));
        }
        if self.days_back == 0 || self.days_back > MAX_DAYS_BACK {
            return Err(invalid(
                "COVERAGE_DAYS_BACK",
                self.days_back,
                &format!("must be between 1 and {}", MAX_DAYS_BACK),
            ));
        }
        if self.cache_ttl_secs <= 0 || self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(invalid(
                "COVERAGE_CACHE_TTL_SECS",
                self.cache_ttl_secs,
                &format!("must be between 1 and {}", MAX_CACHE_TTL_SECS),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(invalid(
                "COVERAGE_CACHE_MAX_ENTRIES",
                self.cache_max_entries,
                "must be at least 1",
            ));
        }
        if self.scorer_timeout_ms == 0 {
            return Err(invalid(
                "COVERAGE_SCORER_TIMEOUT_MS",
                self.scorer_timeout_ms,
                "must be positive",
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid(
                "COVERAGE_REQUEST_TIMEOUT_MS",
                self.request_timeout_ms,
                "must be positive",
            ));
        }
        if let Some(ai) = &self.ai {
            if ai.timeout_sec == 0 {
                return Err(invalid(
                    "COVERAGE_AI_HTTP_TIMEOUT_SECS",
                    ai.timeout_sec,
                    "must be positive",
                ));
            }
        }
        Ok(())
    }

    pub fn scorer_timeout(&self) -> Duration {
        Duration::from_millis(self.scorer_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs.clamp(1, MAX_CACHE_TTL_SECS))
    }
}

fn invalid(var: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) => parse_value(var, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
