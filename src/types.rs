//! Core types for the Synheart Wellbeing engine
//!
//! This module defines the records that flow through each stage of the engine:
//! normalized daily samples, baselines, analysis results, check-ins and
//! support requests.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Authenticated user identifier supplied by the identity collaborator
pub type UserId = String;

/// Metrics tracked per day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SleepHours,
    SleepQuality,
    StepsPerDay,
    ActivityLevel,
    ExerciseMinutes,
    MoodScore,
}

impl Metric {
    /// Every tracked metric, in canonical order
    pub const ALL: [Metric; 6] = [
        Metric::SleepHours,
        Metric::SleepQuality,
        Metric::StepsPerDay,
        Metric::ActivityLevel,
        Metric::ExerciseMinutes,
        Metric::MoodScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::SleepHours => "sleep_hours",
            Metric::SleepQuality => "sleep_quality",
            Metric::StepsPerDay => "steps_per_day",
            Metric::ActivityLevel => "activity_level",
            Metric::ExerciseMinutes => "exercise_minutes",
            Metric::MoodScore => "mood_score",
        }
    }

    /// Whether a move of `delta` is in the unhealthy direction.
    /// Every tracked metric degrades when it falls.
    pub fn is_unhealthy_move(&self, delta: f64) -> bool {
        delta < 0.0
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-reported or sensed activity intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Low,
    Moderate,
    High,
}

impl ActivityLevel {
    /// Numeric scale used for statistics (low = 1, high = 3)
    pub fn as_f64(&self) -> f64 {
        match self {
            ActivityLevel::Low => 1.0,
            ActivityLevel::Moderate => 2.0,
            ActivityLevel::High => 3.0,
        }
    }
}

/// One day's normalized readings for one user.
///
/// Missing fields are `None` and excluded from that metric's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub sleep_hours: Option<f64>,
    /// Sleep quality (0-1)
    pub sleep_quality: Option<f64>,
    pub steps_per_day: Option<u32>,
    pub activity_level: Option<ActivityLevel>,
    pub exercise_minutes: Option<f64>,
    /// Mood score (1-5), averaged over the day's check-ins
    pub mood_score: Option<f64>,
}

impl MetricSample {
    pub fn empty(user_id: impl Into<UserId>, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            sleep_hours: None,
            sleep_quality: None,
            steps_per_day: None,
            activity_level: None,
            exercise_minutes: None,
            mood_score: None,
        }
    }

    /// Value of a metric as a float, if present
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::SleepHours => self.sleep_hours,
            Metric::SleepQuality => self.sleep_quality,
            Metric::StepsPerDay => self.steps_per_day.map(f64::from),
            Metric::ActivityLevel => self.activity_level.map(|l| l.as_f64()),
            Metric::ExerciseMinutes => self.exercise_minutes,
            Metric::MoodScore => self.mood_score,
        }
    }

    pub fn has_data(&self) -> bool {
        Metric::ALL.iter().any(|m| self.value(*m).is_some())
    }
}

/// Per-user, per-metric summary of the trailing history window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub user_id: UserId,
    pub metric: Metric,
    pub mean: f64,
    pub variance: f64,
    pub sample_count: usize,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

impl Baseline {
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// All baselines for one user over one window, swapped in as a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    pub user_id: UserId,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub computed_at: DateTime<Utc>,
    /// Metrics with enough history to compare against
    pub baselines: BTreeMap<Metric, Baseline>,
    /// Metrics that fell below the minimum sample count
    pub insufficient: Vec<Metric>,
}

impl BaselineSnapshot {
    pub fn get(&self, metric: Metric) -> Option<&Baseline> {
        self.baselines.get(&metric)
    }

    /// True when no metric has a usable baseline
    pub fn is_cold(&self) -> bool {
        self.baselines.is_empty()
    }

    /// Whether this snapshot was computed over the given window
    pub fn covers(&self, window_start: NaiveDate, window_end: NaiveDate) -> bool {
        self.window_start == window_start && self.window_end == window_end
    }
}

/// Classified mental-health trajectory, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentalHealthStatus {
    Stable,
    Declining,
    Critical,
}

impl MentalHealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentalHealthStatus::Stable => "stable",
            MentalHealthStatus::Declining => "declining",
            MentalHealthStatus::Critical => "critical",
        }
    }
}

/// Comparison of one metric's current value to its baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub current: f64,
    pub baseline: f64,
    pub delta_sigma: f64,
}

/// One evaluation outcome, appended to the audit history and never edited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub user_id: UserId,
    pub status: MentalHealthStatus,
    /// Confidence in the status (0-1)
    pub confidence_score: f64,
    pub needs_support: bool,
    pub baseline_comparison: BTreeMap<Metric, MetricComparison>,
    /// Significant metrics, most deviant first
    pub significant_changes: Vec<Metric>,
    pub evaluated_at: DateTime<Utc>,
    pub window_days: u32,
}

/// Mood part of a check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    /// Score on a 1-5 scale
    pub score: u8,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Activity reported alongside a check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub level: ActivityLevel,
}

/// Accepted mood/activity self-report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: Uuid,
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub mood: Mood,
    #[serde(default)]
    pub activities: Vec<ActivityEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Per-user check-in cooldown state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInTimer {
    pub user_id: UserId,
    pub last_check_in_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl CheckInTimer {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            last_check_in_at: None,
            cooldown_until: None,
        }
    }

    /// Whether the timer is still cooling at `now`
    pub fn is_cooling(&self, now: DateTime<Utc>) -> bool {
        matches!(self.cooldown_until, Some(until) if now < until)
    }
}

/// Answer to "can this user check in right now?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInStatus {
    pub can_check_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_check_in_time: Option<DateTime<Utc>>,
}

/// Lifecycle of a support request. `Claimed` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportRequestState {
    Open,
    Claimed,
    Expired,
}

/// Discoverable request inviting a buddy to reach out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportRequest {
    pub id: Uuid,
    pub requester_id: UserId,
    pub triggering_analysis_id: Uuid,
    pub mental_health_status: MentalHealthStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    pub state: SupportRequestState,
}

impl SupportRequest {
    pub fn is_open(&self) -> bool {
        self.state == SupportRequestState::Open
    }

    /// Open, but past its time-to-live
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && now >= self.expires_at
    }
}

/// Role of an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Member,
    /// Support/test tooling allowed to run privileged operations
    Support,
}

/// Identity attached to an inbound request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub role: CallerRole,
}

impl Caller {
    pub fn member(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: CallerRole::Member,
        }
    }

    pub fn support(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: CallerRole::Support,
        }
    }
}
