//! Window feature derivation
//!
//! This module condenses the current evaluation window's daily samples into
//! the vector the comparator works on:
//! - Per-metric mean over the days that report the metric
//! - Trailing run of consecutive low-mood days (for the hard critical rule)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Metric, MetricSample};

/// Current-window feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    pub user_id: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub days_with_data: usize,
    /// Mean of each metric over the days reporting it
    pub means: BTreeMap<Metric, f64>,
    /// Consecutive days, ending at the latest mood reading, with mood at or
    /// below the critical score
    pub low_mood_run_days: u32,
}

impl WindowFeatures {
    pub fn current(&self, metric: Metric) -> Option<f64> {
        self.means.get(&metric).copied()
    }
}

/// Feature deriver for the current window
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Derive features from samples within `[window_start, window_end]`
    pub fn derive(
        user_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
        samples: &[MetricSample],
        critical_mood_score: f64,
    ) -> WindowFeatures {
        let mut window: Vec<&MetricSample> = samples
            .iter()
            .filter(|s| s.date >= window_start && s.date <= window_end)
            .collect();
        window.sort_by_key(|s| s.date);

        let mut means = BTreeMap::new();
        for metric in Metric::ALL {
            let values: Vec<f64> = window.iter().filter_map(|s| s.value(metric)).collect();
            if !values.is_empty() {
                means.insert(metric, values.iter().sum::<f64>() / values.len() as f64);
            }
        }

        WindowFeatures {
            user_id: user_id.to_string(),
            window_start,
            window_end,
            days_with_data: window.len(),
            means,
            low_mood_run_days: compute_low_mood_run(&window, critical_mood_score),
        }
    }
}

/// Run of calendar-adjacent low-mood days (mood <= threshold) ending at the
/// most recent mood reading in the window. A day without a mood reading
/// breaks the run, so a recovered latest reading yields 0.
fn compute_low_mood_run(window: &[&MetricSample], threshold: f64) -> u32 {
    let mut run = 0;
    let mut next: Option<NaiveDate> = None;

    for sample in window.iter().rev() {
        let Some(score) = sample.mood_score else {
            continue;
        };
        if score > threshold {
            break;
        }
        if let Some(later) = next {
            if sample.date.succ_opt() != Some(later) {
                break;
            }
        }
        run += 1;
        next = Some(sample.date);
    }

    run
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample(d: u32, sleep: Option<f64>, mood: Option<f64>) -> MetricSample {
        let mut s = MetricSample::empty("u1", day(d));
        s.sleep_hours = sleep;
        s.mood_score = mood;
        s
    }

    #[test]
    fn test_window_means_skip_missing() {
        let samples = vec![
            sample(9, Some(9.0), Some(5.0)),
            sample(10, Some(4.0), None),
            sample(11, Some(5.0), Some(2.0)),
            sample(12, None, Some(3.0)),
        ];

        let features = FeatureDeriver::derive("u1", day(10), day(12), &samples, 1.0);

        assert_eq!(features.days_with_data, 3);
        assert!((features.current(Metric::SleepHours).unwrap() - 4.5).abs() < 1e-9);
        assert!((features.current(Metric::MoodScore).unwrap() - 2.5).abs() < 1e-9);
        assert_eq!(features.current(Metric::StepsPerDay), None);
    }

    #[test]
    fn test_low_mood_run_requires_adjacent_days() {
        let samples = vec![
            sample(10, None, Some(1.0)),
            sample(12, None, Some(1.0)),
            sample(13, None, Some(1.0)),
        ];
        let features = FeatureDeriver::derive("u1", day(10), day(13), &samples, 1.0);
        assert_eq!(features.low_mood_run_days, 2);

        let samples = vec![sample(10, None, Some(1.0)), sample(12, None, Some(1.0))];
        let features = FeatureDeriver::derive("u1", day(10), day(13), &samples, 1.0);
        assert_eq!(features.low_mood_run_days, 1);
    }

    #[test]
    fn test_low_mood_run_broken_by_better_day() {
        let samples = vec![
            sample(10, None, Some(1.0)),
            sample(11, None, Some(3.0)),
            sample(12, None, Some(1.0)),
        ];
        let features = FeatureDeriver::derive("u1", day(10), day(12), &samples, 1.0);
        assert_eq!(features.low_mood_run_days, 1);
    }

    #[test]
    fn test_recovered_latest_day_clears_low_mood_run() {
        let samples = vec![
            sample(10, None, Some(1.0)),
            sample(11, None, Some(1.0)),
            sample(12, None, Some(5.0)),
        ];
        let features = FeatureDeriver::derive("u1", day(10), day(12), &samples, 1.0);
        assert_eq!(features.low_mood_run_days, 0);
    }

    #[test]
    fn test_low_mood_run_ends_at_latest_mood_reading() {
        let samples = vec![
            sample(10, None, Some(1.0)),
            sample(11, None, Some(0.5)),
            sample(12, Some(6.0), None),
        ];
        let features = FeatureDeriver::derive("u1", day(10), day(12), &samples, 1.0);
        assert_eq!(features.low_mood_run_days, 2);
    }
}
