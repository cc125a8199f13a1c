//! Analysis encoding
//!
//! This module wraps an [`AnalysisResult`] in a versioned JSON envelope with
//! producer metadata, the evaluated window and quality flags, so hosts and
//! audit consumers can tell which build produced a result and how much of it
//! rests on a real baseline.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{AnalysisResult, Metric};
use crate::{PRODUCER_NAME, WELLBEING_VERSION};

/// Current envelope schema version
pub const ENVELOPE_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisQuality {
    /// Metrics compared against a baseline
    pub evaluated_metrics: usize,
    /// Metrics with no value in the window or no baseline yet
    pub missing_metrics: Vec<Metric>,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    pub schema_version: String,
    pub producer: Producer,
    pub computed_at_utc: String,
    pub window: EvaluatedWindow,
    pub quality: AnalysisQuality,
    pub result: AnalysisResult,
}

/// Encoder for analysis envelopes
pub struct AnalysisEncoder {
    instance_id: String,
}

impl Default for AnalysisEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, result: &AnalysisResult) -> AnalysisEnvelope {
        self.encode_at(result, Utc::now())
    }

    pub fn encode_at(&self, result: &AnalysisResult, computed_at: DateTime<Utc>) -> AnalysisEnvelope {
        let end = result.evaluated_at.date_naive();
        let start = end - Duration::days(i64::from(result.window_days.max(1)) - 1);

        AnalysisEnvelope {
            schema_version: ENVELOPE_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: WELLBEING_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: computed_at.to_rfc3339(),
            window: EvaluatedWindow {
                start,
                end,
                days: result.window_days,
            },
            quality: build_quality(result),
            result: result.clone(),
        }
    }

    /// Encode to compact JSON
    pub fn encode_to_json(&self, result: &AnalysisResult) -> Result<String> {
        Ok(serde_json::to_string(&self.encode(result))?)
    }

    /// Encode to indented JSON
    pub fn encode_to_json_pretty(&self, result: &AnalysisResult) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.encode(result))?)
    }
}

fn build_quality(result: &AnalysisResult) -> AnalysisQuality {
    let missing_metrics: Vec<Metric> = Metric::ALL
        .into_iter()
        .filter(|m| !result.baseline_comparison.contains_key(m))
        .collect();

    let mut flags = Vec::new();
    if result.baseline_comparison.is_empty() {
        flags.push("cold_start".to_string());
    } else if !missing_metrics.is_empty() {
        flags.push("partial_baseline".to_string());
    }
    if result.needs_support {
        flags.push("needs_support".to_string());
    }

    AnalysisQuality {
        evaluated_metrics: result.baseline_comparison.len(),
        missing_metrics,
        flags,
    }
}
