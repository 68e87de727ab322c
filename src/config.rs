//! Run configuration loaded from YAML.
//!
//! ```yaml
//! source: CBC News
//! timezone: America/Toronto
//! window_hours: 24
//! allow_extract: false
//! rate_limit_seconds: 1.0
//! allowed_hours: [6, 12, 18]
//! sections:
//!   top:
//!     name: Top Stories
//!     url: https://www.cbc.ca/webfeed/rss/rss-topstories
//!     max_items: 20
//! fetch:
//!   timeout_secs: 20
//!   max_attempts: 6
//! dedup:
//!   ignore_trailing_slash: false
//! ```
//!
//! Everything except `sections` has a default. The file is read once per run
//! and the resulting [`AppConfig`] is never mutated.

use crate::error::ConfigError;
use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

/// One configured feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SectionConfig {
    /// Mapping key in the `sections` table; used in logs.
    #[serde(skip)]
    pub key: String,
    /// Display name written into each record's `section` field.
    pub name: String,
    pub url: String,
    pub max_items: usize,
}

/// Retry, timeout and politeness parameters handed to the fetcher.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchPolicy {
    /// Per-request timeout for feed documents.
    pub timeout_secs: f64,
    /// Per-request timeout for full-article pages.
    pub page_timeout_secs: f64,
    /// Total attempts for a feed request, first try included.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub backoff_base_secs: f64,
    pub backoff_max_secs: f64,
    /// Randomized pause before each feed request is drawn from this range.
    pub pause_min_secs: f64,
    pub pause_max_secs: f64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 20.0,
            page_timeout_secs: 15.0,
            max_attempts: 6,
            backoff_base_secs: 0.8,
            backoff_max_secs: 120.0,
            pause_min_secs: 0.8,
            pause_max_secs: 2.0,
        }
    }
}

impl FetchPolicy {
    /// No pauses or backoff; used where timing is irrelevant.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            backoff_base_secs: 0.0,
            backoff_max_secs: 0.0,
            pause_min_secs: 0.0,
            pause_max_secs: 0.0,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        secs(self.page_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        secs(self.backoff_base_secs)
    }

    pub fn backoff_max(&self) -> Duration {
        secs(self.backoff_max_secs)
    }
}

/// How URLs are compared when deduplicating across sections.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DedupPolicy {
    /// Treat `https://a/b/` and `https://a/b` as the same article.
    pub ignore_trailing_slash: bool,
    /// Drop the query string and fragment before comparing.
    pub ignore_query: bool,
}

/// Fully validated configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: String,
    pub timezone: Tz,
    /// Window in which articles are kept, anchored at the run's `now`.
    pub window: chrono::Duration,
    pub allow_extract: bool,
    /// Base for the jittered pause between sections.
    pub rate_limit: Duration,
    pub section_pause_floor: Duration,
    pub allowed_hours: Vec<u32>,
    pub summary_max_chars: usize,
    /// Run order is file order.
    pub sections: Vec<SectionConfig>,
    pub fetch: FetchPolicy,
    pub dedup: DedupPolicy,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_source")]
    source: String,
    #[serde(default = "default_timezone")]
    timezone: String,
    #[serde(default = "default_window_hours")]
    window_hours: f64,
    #[serde(default)]
    allow_extract: bool,
    #[serde(default = "default_rate_limit")]
    rate_limit_seconds: f64,
    #[serde(default = "default_section_pause_floor")]
    section_pause_floor_seconds: f64,
    #[serde(default)]
    allowed_hours: Vec<u32>,
    #[serde(default = "default_summary_max_chars")]
    summary_max_chars: usize,
    sections: serde_yaml::Mapping,
    #[serde(default)]
    fetch: FetchPolicy,
    #[serde(default)]
    dedup: DedupPolicy,
}

/// Ten years; keeps `now - window` well inside chrono's range.
const MAX_WINDOW_HOURS: f64 = 24.0 * 366.0 * 10.0;

fn default_source() -> String {
    "CBC News".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_window_hours() -> f64 {
    24.0
}

fn default_rate_limit() -> f64 {
    1.0
}

fn default_section_pause_floor() -> f64 {
    0.5
}

fn default_summary_max_chars() -> usize {
    500
}

/// Read and validate the YAML file at `path`.
#[instrument(level = "info")]
pub async fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
    let config = AppConfig::from_yaml_str(&text)?;
    info!(
        sections = config.sections.len(),
        timezone = %config.timezone.name(),
        window_hours = config.window.num_hours(),
        allow_extract = config.allow_extract,
        "Loaded configuration"
    );
    Ok(config)
}

impl AppConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(text)?;

        let timezone: Tz = raw.timezone.parse().map_err(|e| ConfigError::Timezone {
            name: raw.timezone.clone(),
            reason: format!("{e}"),
        })?;

        non_negative("window_hours", raw.window_hours)?;
        if raw.window_hours > MAX_WINDOW_HOURS {
            return Err(ConfigError::Invalid(format!(
                "window_hours must be at most {MAX_WINDOW_HOURS}, got {}",
                raw.window_hours
            )));
        }
        non_negative("rate_limit_seconds", raw.rate_limit_seconds)?;
        non_negative("section_pause_floor_seconds", raw.section_pause_floor_seconds)?;
        validate_fetch(&raw.fetch)?;

        if let Some(h) = raw.allowed_hours.iter().find(|h| **h > 23) {
            return Err(ConfigError::Invalid(format!("allowed_hours contains {h}")));
        }

        let mut sections = Vec::with_capacity(raw.sections.len());
        for (key, value) in raw.sections {
            let key = key
                .as_str()
                .ok_or_else(|| ConfigError::Invalid("section keys must be strings".to_string()))?
                .to_string();
            let mut section: SectionConfig = serde_yaml::from_value(value)?;
            if section.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("section {key} has an empty url")));
            }
            section.key = key;
            sections.push(section);
        }

        Ok(Self {
            source: raw.source,
            timezone,
            window: chrono::Duration::milliseconds((raw.window_hours * 3_600_000.0) as i64),
            allow_extract: raw.allow_extract,
            rate_limit: secs(raw.rate_limit_seconds),
            section_pause_floor: secs(raw.section_pause_floor_seconds),
            allowed_hours: raw.allowed_hours,
            summary_max_chars: raw.summary_max_chars,
            sections,
            fetch: raw.fetch,
            dedup: raw.dedup,
        })
    }
}

/// Whether a scheduled run may proceed at `now`.
///
/// An empty `allowed_hours` list means the run is not gated.
pub fn should_run(config: &AppConfig, now: &DateTime<Tz>, force: bool) -> bool {
    if force {
        info!("Force mode enabled; bypassing allowed_hours gate");
        return true;
    }
    if config.allowed_hours.is_empty() || config.allowed_hours.contains(&now.hour()) {
        return true;
    }
    info!(
        hour = now.hour(),
        allowed = ?config.allowed_hours,
        "Current hour is not in allowed_hours; exiting without work"
    );
    false
}

fn validate_fetch(fetch: &FetchPolicy) -> Result<(), ConfigError> {
    non_negative("fetch.timeout_secs", fetch.timeout_secs)?;
    non_negative("fetch.page_timeout_secs", fetch.page_timeout_secs)?;
    non_negative("fetch.backoff_base_secs", fetch.backoff_base_secs)?;
    non_negative("fetch.backoff_max_secs", fetch.backoff_max_secs)?;
    non_negative("fetch.pause_min_secs", fetch.pause_min_secs)?;
    non_negative("fetch.pause_max_secs", fetch.pause_max_secs)?;
    if fetch.max_attempts == 0 {
        return Err(ConfigError::Invalid("fetch.max_attempts must be at least 1".to_string()));
    }
    if fetch.pause_min_secs > fetch.pause_max_secs {
        return Err(ConfigError::Invalid(
            "fetch.pause_min_secs exceeds fetch.pause_max_secs".to_string(),
        ));
    }
    Ok(())
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be a non-negative number, got {value}")))
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
