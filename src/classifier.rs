//! Status classification
//!
//! A deterministic rule cascade over comparator output:
//! 1. No usable baseline (cold start) → stable, confidence 0
//! 2. Unhealthy significant metrics: 0 → stable, fewer than the critical
//!    count → declining, otherwise critical. A run of very low mood days is
//!    critical regardless of count.
//! 3. Confidence blends the largest significant |deltaSigma| (saturating) with
//!    baseline history length, so short histories cap confidence.
//! 4. Support is needed when critical, or declining with confidence above the
//!    support threshold.
//!
//! Values exactly at a threshold resolve toward the less severe outcome.

use serde::{Deserialize, Serialize};

use crate::comparator::Comparison;
use crate::config::Policy;
use crate::features::WindowFeatures;
use crate::types::{BaselineSnapshot, MentalHealthStatus};

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub status: MentalHealthStatus,
    pub confidence_score: f64,
    pub needs_support: bool,
}

impl Classification {
    /// Unknown-baseline outcome
    pub fn cold_start() -> Self {
        Self {
            status: MentalHealthStatus::Stable,
            confidence_score: 0.0,
            needs_support: false,
        }
    }
}

/// Rule-cascade classifier
pub struct StatusClassifier;

impl StatusClassifier {
    pub fn classify(
        comparison: &Comparison,
        features: &WindowFeatures,
        snapshot: Option<&BaselineSnapshot>,
        policy: &Policy,
    ) -> Classification {
        let snapshot = match snapshot {
            Some(s) if !s.is_cold() => s,
            _ => return Classification::cold_start(),
        };

        let unhealthy = comparison
            .significant
            .iter()
            .filter(|m| {
                comparison
                    .delta_sigma(**m)
                    .map(|sigma| m.is_unhealthy_move(sigma))
                    .unwrap_or(false)
            })
            .count();

        let hard_critical = features.low_mood_run_days >= policy.critical_mood_consecutive_days;

        let status = if hard_critical || unhealthy >= policy.critical_metric_count {
            MentalHealthStatus::Critical
        } else if unhealthy > 0 {
            MentalHealthStatus::Declining
        } else {
            MentalHealthStatus::Stable
        };

        let max_sigma = comparison
            .significant
            .iter()
            .filter_map(|m| comparison.delta_sigma(*m))
            .map(f64::abs)
            .fold(0.0, f64::max);

        // Shortest history among the evaluated metrics bounds the whole result
        let history = comparison
            .entries
            .keys()
            .filter_map(|m| snapshot.get(*m))
            .map(|b| b.sample_count)
            .min()
            .unwrap_or(0);

        let confidence_score = Self::confidence(max_sigma, history, policy);

        let needs_support = match status {
            MentalHealthStatus::Critical => true,
            MentalHealthStatus::Declining => confidence_score > policy.support_threshold,
            MentalHealthStatus::Stable => false,
        };

        Classification {
            status,
            confidence_score,
            needs_support,
        }
    }

    /// Confidence in [0, 1], non-decreasing in both `max_abs_sigma` and
    /// `sample_count`.
    pub fn confidence(max_abs_sigma: f64, sample_count: usize, policy: &Policy) -> f64 {
        if !(max_abs_sigma > 0.0) || sample_count == 0 {
            return 0.0;
        }
        let magnitude = 1.0 - (-max_abs_sigma / policy.confidence_scale).exp();
        let history =
            (sample_count as f64 / policy.full_confidence_samples as f64).min(1.0);
        (magnitude * history).clamp(0.0, 1.0)
    }
}
