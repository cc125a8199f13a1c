//! Daily health records supplied by the health-data source
//!
//! Records are tagged by `record_type` and carry the calendar day they belong
//! to. A source may return several records for one day (two sleep segments,
//! several step batches) or none at all.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{check_range, ValidationError};
use crate::types::ActivityLevel;

/// A sleep record. Duration is given directly or derived from start/end times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Sleep quality (0-1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
}

impl SleepRecord {
    /// Sleep duration in hours, if it can be determined
    pub fn duration_hours(&self) -> Option<f64> {
        self.hours.or_else(|| match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if end >= start => {
                Some((end - start).num_seconds() as f64 / 3600.0)
            }
            _ => None,
        })
    }
}

/// Sensed activity intensity for a day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub date: NaiveDate,
    pub level: ActivityLevel,
}

/// A single exercise session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSession {
    pub date: NaiveDate,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub duration_minutes: f64,
}

/// A step count batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub date: NaiveDate,
    pub count: u32,
}

/// One raw record from the health-data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum HealthRecord {
    Sleep(SleepRecord),
    Activity(ActivityRecord),
    Exercise(ExerciseSession),
    Steps(StepRecord),
}

impl HealthRecord {
    /// Calendar day this record belongs to
    pub fn date(&self) -> NaiveDate {
        match self {
            HealthRecord::Sleep(r) => r.date,
            HealthRecord::Activity(r) => r.date,
            HealthRecord::Exercise(r) => r.date,
            HealthRecord::Steps(r) => r.date,
        }
    }

    pub fn record_type(&self) -> &'static str {
        match self {
            HealthRecord::Sleep(_) => "sleep",
            HealthRecord::Activity(_) => "activity",
            HealthRecord::Exercise(_) => "exercise",
            HealthRecord::Steps(_) => "steps",
        }
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            HealthRecord::Sleep(sleep) => {
                if let (Some(start), Some(end)) = (sleep.start_time, sleep.end_time) {
                    if end < start {
                        return Err(ValidationError::InvalidTimeRange("sleep".to_string()));
                    }
                }
                if let Some(hours) = sleep.duration_hours() {
                    check_range("sleep.hours", hours, 0.0, 24.0)?;
                } else if sleep.quality.is_none() {
                    return Err(ValidationError::MissingField("sleep.hours".to_string()));
                }
                if let Some(quality) = sleep.quality {
                    check_range("sleep.quality", quality, 0.0, 1.0)?;
                }
                Ok(())
            }
            HealthRecord::Activity(_) => Ok(()),
            HealthRecord::Exercise(exercise) => {
                check_range("exercise.duration_minutes", exercise.duration_minutes, 0.0, 1440.0)
            }
            HealthRecord::Steps(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tagged_records() {
        let json = r#"[
            {"record_type": "sleep", "date": "2024-01-15", "hours": 7.5, "quality": 0.8},
            {"record_type": "activity", "date": "2024-01-15", "level": "moderate"},
            {"record_type": "exercise", "date": "2024-01-15", "type": "run", "duration_minutes": 30},
            {"record_type": "steps", "date": "2024-01-15", "count": 8500}
        ]"#;

        let records: Vec<HealthRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].record_type(), "sleep");
        assert!(matches!(
            &records[1],
            HealthRecord::Activity(ActivityRecord {
                level: ActivityLevel::Moderate,
                ..
            })
        ));
        assert!(records.iter().all(|r| r.validate().is_ok()));
    }

    #[test]
    fn test_sleep_duration_from_times() {
        let record = SleepRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            hours: None,
            start_time: Some("2024-01-15T23:00:00Z".parse().unwrap()),
            end_time: Some("2024-01-16T06:30:00Z".parse().unwrap()),
            quality: None,
        };
        assert!((record.duration_hours().unwrap() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_reject_inverted_sleep_window() {
        let record = HealthRecord::Sleep(SleepRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            hours: None,
            start_time: Some("2024-01-16T06:30:00Z".parse().unwrap()),
            end_time: Some("2024-01-15T23:00:00Z".parse().unwrap()),
            quality: None,
        });
        assert_eq!(
            record.validate(),
            Err(ValidationError::InvalidTimeRange("sleep".to_string()))
        );
    }

    #[test]
    fn test_reject_out_of_range_quality() {
        let record = HealthRecord::Sleep(SleepRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            hours: Some(7.0),
            start_time: None,
            end_time: None,
            quality: Some(85.0),
        });
        assert!(matches!(
            record.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }
}
