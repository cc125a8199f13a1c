//! Baseline management
//!
//! This module computes each user's personal baseline (mean and variance per
//! metric) over a trailing history window and keeps the active snapshot in an
//! injected [`BaselinePersistence`].
//!
//! Computation is a pure function of the samples and window, so recomputing
//! with identical inputs yields identical baselines. A user's baselines are
//! replaced as one snapshot; readers hold an `Arc` to whichever snapshot was
//! active when they looked and never see a mix of old and new values.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapters::BaselinePersistence;
use crate::error::{Result, WellbeingError};
use crate::types::{Baseline, BaselineSnapshot, Metric, MetricSample};

/// Default minimum number of days with a value before a baseline exists
pub const DEFAULT_MIN_BASELINE_SAMPLES: usize = 5;

/// Compute one metric's baseline from samples dated within `[window_start, window_end]`.
///
/// Fails with `InsufficientBaseline` when fewer than `min_samples` days report
/// the metric.
pub fn compute_baseline(
    user_id: &str,
    metric: Metric,
    samples: &[MetricSample],
    window_start: NaiveDate,
    window_end: NaiveDate,
    min_samples: usize,
) -> Result<Baseline> {
    let mut dated: Vec<(NaiveDate, f64)> = samples
        .iter()
        .filter(|s| s.user_id == user_id && s.date >= window_start && s.date <= window_end)
        .filter_map(|s| s.value(metric).map(|v| (s.date, v)))
        .collect();
    // Fixed summation order keeps recomputation bit-identical
    dated.sort_by_key(|(date, _)| *date);

    if dated.len() < min_samples.max(1) {
        return Err(WellbeingError::InsufficientBaseline {
            metric: metric.to_string(),
            samples: dated.len(),
            required: min_samples,
        });
    }

    let n = dated.len() as f64;
    let mean = dated.iter().map(|(_, v)| v).sum::<f64>() / n;
    let variance = if dated.len() > 1 {
        dated.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };

    Ok(Baseline {
        user_id: user_id.to_string(),
        metric,
        mean,
        variance,
        sample_count: dated.len(),
        window_start,
        window_end,
    })
}

/// Baseline store over an injected persistence backend
pub struct BaselineStore {
    persistence: Arc<dyn BaselinePersistence>,
    min_samples: usize,
}

impl BaselineStore {
    pub fn new(persistence: Arc<dyn BaselinePersistence>, min_samples: usize) -> Self {
        Self {
            persistence,
            min_samples,
        }
    }

    /// Compute every metric's baseline for one window. Metrics below the
    /// minimum sample count are listed as insufficient instead.
    pub fn compute_snapshot(
        &self,
        user_id: &str,
        samples: &[MetricSample],
        window_start: NaiveDate,
        window_end: NaiveDate,
        computed_at: DateTime<Utc>,
    ) -> BaselineSnapshot {
        let mut baselines = BTreeMap::new();
        let mut insufficient = Vec::new();

        for metric in Metric::ALL {
            match compute_baseline(
                user_id,
                metric,
                samples,
                window_start,
                window_end,
                self.min_samples,
            ) {
                Ok(baseline) => {
                    baselines.insert(metric, baseline);
                }
                Err(_) => insufficient.push(metric),
            }
        }

        BaselineSnapshot {
            user_id: user_id.to_string(),
            window_start,
            window_end,
            computed_at,
            baselines,
            insufficient,
        }
    }

    /// Currently active snapshot for a user
    pub fn active(&self, user_id: &str) -> Result<Option<Arc<BaselineSnapshot>>> {
        self.persistence.load_latest(user_id)
    }

    /// Recompute from `samples` and make the result active.
    ///
    /// If the active snapshot already covers the same window with identical
    /// baselines it stays in place and is returned.
    pub fn refresh(
        &self,
        user_id: &str,
        samples: &[MetricSample],
        window_start: NaiveDate,
        window_end: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Arc<BaselineSnapshot>> {
        let fresh = self.compute_snapshot(user_id, samples, window_start, window_end, now);

        if let Some(active) = self.active(user_id)? {
            if active.covers(window_start, window_end)
                && active.baselines == fresh.baselines
                && active.insufficient == fresh.insufficient
            {
                return Ok(active);
            }
        }

        tracing::debug!(
            user_id,
            window_start = %window_start,
            window_end = %window_end,
            metrics = fresh.baselines.len(),
            insufficient = fresh.insufficient.len(),
            "baseline swapped"
        );
        self.persistence.swap(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBaselineStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sleep_sample(d: u32, hours: f64) -> MetricSample {
        let mut s = MetricSample::empty("u1", day(d));
        s.sleep_hours = Some(hours);
        s
    }

    fn store(min_samples: usize) -> BaselineStore {
        BaselineStore::new(Arc::new(InMemoryBaselineStore::new()), min_samples)
    }

    #[test]
    fn test_mean_and_sample_variance() {
        let samples: Vec<MetricSample> = [6.0, 7.0, 8.0, 7.0, 7.0]
            .iter()
            .enumerate()
            .map(|(i, h)| sleep_sample(i as u32 + 1, *h))
            .collect();

        let baseline =
            compute_baseline("u1", Metric::SleepHours, &samples, day(1), day(5), 5).unwrap();

        assert!((baseline.mean - 7.0).abs() < 1e-12);
        // Squared deviations 1 + 0 + 1 + 0 + 0 over n - 1
        assert!((baseline.variance - 0.5).abs() < 1e-12);
        assert_eq!(baseline.sample_count, 5);
    }

    #[test]
    fn test_window_excludes_outside_days() {
        let samples: Vec<MetricSample> = (1..=10).map(|d| sleep_sample(d, d as f64)).collect();
        let baseline =
            compute_baseline("u1", Metric::SleepHours, &samples, day(3), day(7), 5).unwrap();
        assert_eq!(baseline.sample_count, 5);
        assert!((baseline.mean - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_samples() {
        let samples: Vec<MetricSample> = (1..=4).map(|d| sleep_sample(d, 7.0)).collect();
        let err =
            compute_baseline("u1", Metric::SleepHours, &samples, day(1), day(10), 5).unwrap_err();
        assert!(matches!(
            err,
            WellbeingError::InsufficientBaseline {
                samples: 4,
                required: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_recompute_is_bit_identical() {
        let samples: Vec<MetricSample> = [7.1, 6.3, 8.9, 5.2, 7.7, 6.6]
            .iter()
            .enumerate()
            .map(|(i, h)| sleep_sample(i as u32 + 1, *h))
            .collect();
        let mut shuffled = samples.clone();
        shuffled.reverse();

        let a = compute_baseline("u1", Metric::SleepHours, &samples, day(1), day(6), 5).unwrap();
        let b = compute_baseline("u1", Metric::SleepHours, &shuffled, day(1), day(6), 5).unwrap();

        assert_eq!(a.mean.to_bits(), b.mean.to_bits());
        assert_eq!(a.variance.to_bits(), b.variance.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_snapshot_marks_insufficient_metrics() {
        let samples: Vec<MetricSample> = (1..=6).map(|d| sleep_sample(d, 7.0)).collect();
        let snapshot = store(5).compute_snapshot("u1", &samples, day(1), day(6), Utc::now());

        assert!(snapshot.get(Metric::SleepHours).is_some());
        assert!(snapshot.insufficient.contains(&Metric::MoodScore));
        assert!(!snapshot.is_cold());
    }

    #[test]
    fn test_refresh_keeps_identical_snapshot() {
        let store = store(5);
        let samples: Vec<MetricSample> = (1..=6).map(|d| sleep_sample(d, 7.0)).collect();

        let first = store.refresh("u1", &samples, day(1), day(6), Utc::now()).unwrap();
        let second = store.refresh("u1", &samples, day(1), day(6), Utc::now()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let moved: Vec<MetricSample> = (2..=7).map(|d| sleep_sample(d, 7.0)).collect();
        let third = store.refresh("u1", &moved, day(2), day(7), Utc::now()).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        // Earlier readers keep their consistent snapshot
        assert_eq!(first.window_end, day(6));
        assert_eq!(store.active("u1").unwrap().unwrap().window_end, day(7));
    }
}
