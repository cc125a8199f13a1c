//! Metric normalization
//!
//! This module converts heterogeneous raw inputs into one [`MetricSample`] per
//! calendar day:
//! - Sleep hours and exercise minutes are summed, sleep quality averaged
//! - Step batches are summed
//! - Activity level is the highest sensed level, falling back to check-in activities
//! - Mood is the mean of the day's check-in scores
//!
//! Days without any data are left out rather than zero-filled, and missing
//! fields stay `None`.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::error::{Result, WellbeingError};
use crate::schema::HealthRecord;
use crate::types::{ActivityLevel, CheckIn, MetricSample};

/// Normalizer for building per-day metric samples
pub struct MetricNormalizer;

impl MetricNormalizer {
    /// Normalize raw records and check-ins within `[start, end]` (inclusive).
    ///
    /// Fails with `InsufficientData` if no day in the range carries data, and
    /// with `InvalidInput` if any in-range record is malformed.
    pub fn normalize(
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        records: &[HealthRecord],
        check_ins: &[CheckIn],
    ) -> Result<Vec<MetricSample>> {
        let in_range = |date: NaiveDate| date >= start && date <= end;
        let mut by_date: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

        for record in records {
            let date = record.date();
            if !in_range(date) {
                continue;
            }
            record.validate()?;
            by_date.entry(date).or_default().add_record(record);
        }

        for check_in in check_ins {
            let date = check_in.timestamp.date_naive();
            if !in_range(date) {
                continue;
            }
            by_date.entry(date).or_default().add_check_in(check_in);
        }

        let samples: Vec<MetricSample> = by_date
            .into_iter()
            .map(|(date, acc)| acc.into_sample(user_id, date))
            .filter(MetricSample::has_data)
            .collect();

        if samples.is_empty() {
            return Err(WellbeingError::InsufficientData(format!(
                "no data for {} between {} and {}",
                user_id, start, end
            )));
        }

        Ok(samples)
    }
}

// Overlapping records (e.g. from two sources) cannot add up past a full day
const HOURS_PER_DAY: f64 = 24.0;
const MINUTES_PER_DAY: f64 = 1440.0;

/// Accumulator for aggregating records into a single day
#[derive(Default)]
struct DayAccumulator {
    sleep_hours: Option<f64>,
    sleep_qualities: Vec<f64>,
    steps: Option<u32>,
    sensed_level: Option<ActivityLevel>,
    reported_level: Option<ActivityLevel>,
    exercise_minutes: Option<f64>,
    mood_scores: Vec<f64>,
}

impl DayAccumulator {
    fn add_record(&mut self, record: &HealthRecord) {
        match record {
            HealthRecord::Sleep(sleep) => {
                if let Some(hours) = sleep.duration_hours() {
                    *self.sleep_hours.get_or_insert(0.0) += hours;
                }
                if let Some(quality) = sleep.quality {
                    self.sleep_qualities.push(quality);
                }
            }
            HealthRecord::Activity(activity) => {
                self.sensed_level = self.sensed_level.max(Some(activity.level));
            }
            HealthRecord::Exercise(exercise) => {
                *self.exercise_minutes.get_or_insert(0.0) += exercise.duration_minutes;
            }
            HealthRecord::Steps(steps) => {
                let total = self.steps.get_or_insert(0);
                *total = total.saturating_add(steps.count);
            }
        }
    }

    fn add_check_in(&mut self, check_in: &CheckIn) {
        self.mood_scores.push(f64::from(check_in.mood.score));
        for activity in &check_in.activities {
            self.reported_level = self.reported_level.max(Some(activity.level));
        }
    }

    fn into_sample(self, user_id: &str, date: NaiveDate) -> MetricSample {
        MetricSample {
            user_id: user_id.to_string(),
            date,
            sleep_hours: self.sleep_hours.map(|h| h.min(HOURS_PER_DAY)),
            sleep_quality: mean(&self.sleep_qualities),
            steps_per_day: self.steps,
            activity_level: self.sensed_level.or(self.reported_level),
            exercise_minutes: self.exercise_minutes.map(|m| m.min(MINUTES_PER_DAY)),
            mood_score: mean(&self.mood_scores),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ActivityRecord, ExerciseSession, SleepRecord, StepRecord};
    use crate::types::{ActivityEntry, Mood};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn check_in(d: u32, hour: u32, score: u8, activities: Vec<ActivityEntry>) -> CheckIn {
        CheckIn {
            id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, d, hour, 0, 0).unwrap(),
            mood: Mood {
                score,
                label: "x".to_string(),
                description: None,
            },
            activities,
            notes: None,
        }
    }

    #[test]
    fn test_aggregates_one_day() {
        let records = vec![
            HealthRecord::Sleep(SleepRecord {
                date: day(10),
                hours: Some(6.0),
                start_time: None,
                end_time: None,
                quality: Some(0.6),
            }),
            HealthRecord::Sleep(SleepRecord {
                date: day(10),
                hours: Some(1.0),
                start_time: None,
                end_time: None,
                quality: Some(0.8),
            }),
            HealthRecord::Steps(StepRecord { date: day(10), count: 4000 }),
            HealthRecord::Steps(StepRecord { date: day(10), count: 2500 }),
            HealthRecord::Activity(ActivityRecord {
                date: day(10),
                level: ActivityLevel::Low,
            }),
            HealthRecord::Activity(ActivityRecord {
                date: day(10),
                level: ActivityLevel::High,
            }),
            HealthRecord::Exercise(ExerciseSession {
                date: day(10),
                kind: Some("yoga".to_string()),
                duration_minutes: 20.0,
            }),
        ];
        let check_ins = vec![check_in(10, 8, 4, vec![]), check_in(10, 20, 2, vec![])];

        let samples =
            MetricNormalizer::normalize("u1", day(1), day(31), &records, &check_ins).unwrap();

        assert_eq!(samples.len(), 1);
        let sample = &samples[0];
        assert_eq!(sample.sleep_hours, Some(7.0));
        assert!((sample.sleep_quality.unwrap() - 0.7).abs() < 1e-9);
        assert_eq!(sample.steps_per_day, Some(6500));
        assert_eq!(sample.activity_level, Some(ActivityLevel::High));
        assert_eq!(sample.exercise_minutes, Some(20.0));
        assert_eq!(sample.mood_score, Some(3.0));
    }

    #[test]
    fn test_gaps_are_not_zero_filled() {
        let records = vec![
            HealthRecord::Steps(StepRecord { date: day(10), count: 100 }),
            HealthRecord::Steps(StepRecord { date: day(13), count: 200 }),
        ];

        let samples = MetricNormalizer::normalize("u1", day(10), day(13), &records, &[]).unwrap();

        let dates: Vec<NaiveDate> = samples.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![day(10), day(13)]);
        // Missing fields stay undefined
        assert_eq!(samples[0].sleep_hours, None);
        assert_eq!(samples[0].mood_score, None);
    }

    #[test]
    fn test_zero_steps_is_data() {
        let records = vec![HealthRecord::Steps(StepRecord { date: day(10), count: 0 })];
        let samples = MetricNormalizer::normalize("u1", day(10), day(10), &records, &[]).unwrap();
        assert_eq!(samples[0].steps_per_day, Some(0));
    }

    #[test]
    fn test_reported_activity_fallback() {
        let check_ins = vec![check_in(
            12,
            9,
            3,
            vec![ActivityEntry {
                activity_type: "walk".to_string(),
                level: ActivityLevel::Moderate,
            }],
        )];
        let samples = MetricNormalizer::normalize("u1", day(1), day(31), &[], &check_ins).unwrap();
        assert_eq!(samples[0].activity_level, Some(ActivityLevel::Moderate));
    }

    #[test]
    fn test_out_of_range_only_is_insufficient() {
        let records = vec![HealthRecord::Steps(StepRecord { date: day(2), count: 100 })];
        let err = MetricNormalizer::normalize("u1", day(10), day(20), &records, &[]).unwrap_err();
        assert!(matches!(err, WellbeingError::InsufficientData(_)));
    }

    #[test]
    fn test_malformed_record_rejected() {
        let records = vec![HealthRecord::Exercise(ExerciseSession {
            date: day(10),
            kind: None,
            duration_minutes: -5.0,
        })];
        let err = MetricNormalizer::normalize("u1", day(10), day(20), &records, &[]).unwrap_err();
        assert!(matches!(err, WellbeingError::InvalidInput(_)));
    }

    #[test]
    fn test_daily_totals_capped_at_one_day() {
        let segment = |hours: f64| {
            HealthRecord::Sleep(SleepRecord {
                date: day(10),
                hours: Some(hours),
                start_time: None,
                end_time: None,
                quality: None,
            })
        };
        let workout = HealthRecord::Exercise(ExerciseSession {
            date: day(10),
            duration_minutes: 1000.0,
            kind: None,
        });
        let records = vec![segment(20.0), segment(20.0), workout.clone(), workout];

        let samples = MetricNormalizer::normalize("u1", day(10), day(10), &records, &[]).unwrap();

        assert_eq!(samples[0].sleep_hours, Some(24.0));
        assert_eq!(samples[0].exercise_minutes, Some(1440.0));
    }
}
