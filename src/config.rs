//! Configuration loading
//!
//! Every threshold the engine applies lives in [`Policy`] and can be set from a
//! TOML file. Unset fields fall back to the documented defaults.
//!
//! ```toml
//! [policy]
//! significance_threshold = 1.5
//! check_in_cooldown_minutes = 240
//!
//! [policy.min_practical_delta]
//! sleep_hours = 1.0
//!
//! [logging]
//! level = "info"
//!
//! [scheduler]
//! interval_minutes = 60
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WellbeingError};
use crate::types::Metric;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.policy.validate()?;
        if config.scheduler.interval_minutes == 0 {
            return Err(WellbeingError::Config(
                "scheduler.interval_minutes must be positive".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Minimum raw change per metric before a deviation counts as practical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticalDeltas {
    pub sleep_hours: f64,
    pub sleep_quality: f64,
    pub steps_per_day: f64,
    pub activity_level: f64,
    pub exercise_minutes: f64,
    pub mood_score: f64,
}

impl Default for PracticalDeltas {
    fn default() -> Self {
        Self {
            sleep_hours: 1.0,
            sleep_quality: 0.1,
            steps_per_day: 1500.0,
            activity_level: 0.5,
            exercise_minutes: 10.0,
            mood_score: 0.5,
        }
    }
}

impl PracticalDeltas {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::SleepHours => self.sleep_hours,
            Metric::SleepQuality => self.sleep_quality,
            Metric::StepsPerDay => self.steps_per_day,
            Metric::ActivityLevel => self.activity_level,
            Metric::ExerciseMinutes => self.exercise_minutes,
            Metric::MoodScore => self.mood_score,
        }
    }
}

/// Analysis, rate-limit and support thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Days of history required before a metric gets a baseline
    pub min_baseline_samples: usize,
    /// Length of the trailing baseline window (days)
    pub baseline_window_days: u32,
    /// Length of the current evaluation window (days)
    pub evaluation_window_days: u32,
    /// |deltaSigma| a metric must exceed to be significant
    pub significance_threshold: f64,
    /// Clamp for |deltaSigma|, also used for zero-variance baselines
    pub max_delta_sigma: f64,
    pub min_practical_delta: PracticalDeltas,
    /// Unhealthy significant metrics at which status becomes critical
    pub critical_metric_count: usize,
    /// Mood at or below this value counts toward the hard critical rule
    pub critical_mood_score: f64,
    pub critical_mood_consecutive_days: u32,
    /// Saturation scale for the magnitude part of confidence
    pub confidence_scale: f64,
    /// Baseline sample count at which history no longer caps confidence
    pub full_confidence_samples: usize,
    /// Confidence a declining status must exceed to request support
    pub support_threshold: f64,
    pub check_in_cooldown_minutes: i64,
    pub support_request_ttl_hours: i64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_baseline_samples: 5,
            baseline_window_days: 28,
            evaluation_window_days: 3,
            significance_threshold: 1.5,
            max_delta_sigma: 10.0,
            min_practical_delta: PracticalDeltas::default(),
            critical_metric_count: 3,
            critical_mood_score: 1.0,
            critical_mood_consecutive_days: 2,
            confidence_scale: 2.0,
            full_confidence_samples: 14,
            support_threshold: 0.6,
            check_in_cooldown_minutes: 240,
            support_request_ttl_hours: 24,
        }
    }
}

impl Policy {
    pub fn check_in_cooldown(&self) -> Duration {
        Duration::minutes(self.check_in_cooldown_minutes)
    }

    pub fn support_request_ttl(&self) -> Duration {
        Duration::hours(self.support_request_ttl_hours)
    }

    /// Reject values that would make the rules meaningless
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(WellbeingError::Config(msg.to_string()));

        if self.min_baseline_samples < 2 {
            return fail("min_baseline_samples must be at least 2");
        }
        if self.baseline_window_days == 0 || self.evaluation_window_days == 0 {
            return fail("window lengths must be positive");
        }
        if (self.baseline_window_days as usize) < self.min_baseline_samples {
            return fail("baseline_window_days cannot hold min_baseline_samples days");
        }
        if !(self.significance_threshold > 0.0) {
            return fail("significance_threshold must be positive");
        }
        if self.max_delta_sigma <= self.significance_threshold {
            return fail("max_delta_sigma must exceed significance_threshold");
        }
        if !(self.confidence_scale > 0.0) {
            return fail("confidence_scale must be positive");
        }
        if self.full_confidence_samples == 0 {
            return fail("full_confidence_samples must be positive");
        }
        if !(0.0..=1.0).contains(&self.support_threshold) {
            return fail("support_threshold must be within 0..=1");
        }
        if self.critical_metric_count == 0 || self.critical_mood_consecutive_days == 0 {
            return fail("critical cutoffs must be positive");
        }
        if self.check_in_cooldown_minutes < 0 || self.support_request_ttl_hours <= 0 {
            return fail("cooldown must be non-negative and TTL positive");
        }
        if Metric::ALL
            .iter()
            .any(|m| self.min_practical_delta.get(*m) < 0.0)
        {
            return fail("min_practical_delta values must be non-negative");
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write daily-rotated logs here instead of stderr
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Cadence of scheduled evaluations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

fn default_interval_minutes() -> u64 {
    60
}

impl SchedulerConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.policy.validate().is_ok());
        assert_eq!(config.policy.check_in_cooldown(), Duration::hours(4));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [policy]
            significance_threshold = 2.0

            [policy.min_practical_delta]
            mood_score = 1.0

            [scheduler]
            interval_minutes = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.policy.significance_threshold, 2.0);
        assert_eq!(config.policy.min_practical_delta.mood_score, 1.0);
        assert_eq!(config.policy.min_practical_delta.sleep_hours, 1.0);
        assert_eq!(config.policy.min_baseline_samples, 5);
        assert_eq!(config.scheduler.interval_minutes, 15);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_reject_invalid_policy() {
        let err = Config::from_toml_str("[policy]\nsupport_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, WellbeingError::Config(_)));

        let err = Config::from_toml_str("[policy]\nmin_baseline_samples = 1\n").unwrap_err();
        assert!(matches!(err, WellbeingError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_malformed_toml() {
        let err = Config::from_toml_str("[policy\n").unwrap_err();
        assert!(matches!(err, WellbeingError::Toml(_)));
    }
}
