//! Baseline comparison
//!
//! For every metric that has both a current-window value and an active
//! baseline, the comparator computes the standardized deviation
//! `deltaSigma = (current - mean) / stddev` and flags the metric as
//! significant when it is both statistically and practically large.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::Policy;
use crate::features::WindowFeatures;
use crate::types::{Baseline, BaselineSnapshot, Metric, MetricComparison};

/// Comparator output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    /// One entry per evaluated metric
    pub entries: BTreeMap<Metric, MetricComparison>,
    /// Significant metrics ordered by descending |deltaSigma|
    pub significant: Vec<Metric>,
}

impl Comparison {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn delta_sigma(&self, metric: Metric) -> Option<f64> {
        self.entries.get(&metric).map(|c| c.delta_sigma)
    }
}

/// Standardized deviation of `current` from `baseline`, clamped to
/// `±max_delta_sigma`. A zero-variance baseline maps any nonzero delta to the
/// clamp and a zero delta to 0.
pub fn delta_sigma(current: f64, baseline: &Baseline, max_delta_sigma: f64) -> f64 {
    let delta = current - baseline.mean;
    let std_dev = baseline.std_dev();

    if delta == 0.0 {
        return 0.0;
    }
    if !(std_dev > 0.0) {
        return max_delta_sigma.copysign(delta);
    }
    (delta / std_dev).clamp(-max_delta_sigma, max_delta_sigma)
}

/// Comparator over window features and a baseline snapshot
pub struct Comparator;

impl Comparator {
    pub fn compare(
        features: &WindowFeatures,
        snapshot: &BaselineSnapshot,
        policy: &Policy,
    ) -> Comparison {
        let mut entries = BTreeMap::new();
        let mut significant: Vec<(Metric, f64)> = Vec::new();

        for metric in Metric::ALL {
            let (Some(current), Some(baseline)) = (features.current(metric), snapshot.get(metric))
            else {
                continue;
            };

            let sigma = delta_sigma(current, baseline, policy.max_delta_sigma);
            entries.insert(
                metric,
                MetricComparison {
                    current,
                    baseline: baseline.mean,
                    delta_sigma: sigma,
                },
            );

            // Strict comparisons: a value exactly at a threshold is not significant
            let raw_delta = (current - baseline.mean).abs();
            if sigma.abs() > policy.significance_threshold
                && raw_delta > policy.min_practical_delta.get(metric)
            {
                significant.push((metric, sigma.abs()));
            }
        }

        // Stable sort keeps canonical metric order for equal magnitudes
        significant.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Comparison {
            entries,
            significant: significant.into_iter().map(|(m, _)| m).collect(),
        }
    }
}
