#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

use synheart_wellbeing::adapters::{
    CheckInLog, InMemoryCheckInLog, InMemoryHealthSource, RecordingMessenger,
};
use synheart_wellbeing::clock::ManualClock;
use synheart_wellbeing::schema::{ActivityRecord, SleepRecord, StepRecord};
use synheart_wellbeing::types::ActivityLevel;
use synheart_wellbeing::{CheckInSubmission, EngineBuilder, HealthRecord, Policy, WellbeingEngine};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 20, 18, 0, 0).unwrap()
}

/// Calendar day `n` days before `now()`
pub fn days_ago(n: i64) -> NaiveDate {
    now().date_naive() - Duration::days(n)
}

pub fn sleep(date: NaiveDate, hours: f64) -> HealthRecord {
    HealthRecord::Sleep(SleepRecord {
        date,
        hours: Some(hours),
        start_time: None,
        end_time: None,
        quality: None,
    })
}

pub fn steps(date: NaiveDate, count: u32) -> HealthRecord {
    HealthRecord::Steps(StepRecord { date, count })
}

pub fn activity(date: NaiveDate, level: ActivityLevel) -> HealthRecord {
    HealthRecord::Activity(ActivityRecord { date, level })
}

pub struct Harness {
    pub engine: Arc<WellbeingEngine>,
    pub clock: Arc<ManualClock>,
    pub health: Arc<InMemoryHealthSource>,
    pub check_ins: Arc<InMemoryCheckInLog>,
    pub messenger: Arc<RecordingMessenger>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(Policy::default())
    }

    pub fn with_policy(policy: Policy) -> Self {
        synheart_wellbeing::logging::init_test();

        let clock = Arc::new(ManualClock::new(now()));
        let health = Arc::new(InMemoryHealthSource::new());
        let check_ins = Arc::new(InMemoryCheckInLog::new());
        let messenger = Arc::new(RecordingMessenger::new());

        let engine = EngineBuilder::new(policy)
            .clock(clock.clone())
            .health_source(health.clone())
            .check_in_log(check_ins.clone())
            .messenger(messenger.clone())
            .build()
            .unwrap();

        Self {
            engine: Arc::new(engine),
            clock,
            health,
            check_ins,
            messenger,
        }
    }

    /// Record a historical mood check-in at midday, bypassing the cooldown
    pub fn mood(&self, user: &str, date: NaiveDate, score: i64) {
        let timestamp = Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap());
        let check_in = CheckInSubmission::with_mood(score)
            .into_check_in(user, timestamp)
            .unwrap();
        self.check_ins.append(check_in).unwrap();
    }

    /// Seven stable baseline days (4..=10 days ago) of sleep, steps and mood
    pub fn seed_baseline(&self, user: &str) {
        let sleep_hours = [7.0, 7.5, 8.0, 7.5, 7.0, 8.0, 7.5];
        let step_counts = [8800, 9200, 9000, 9100, 8900, 9000, 9000];
        let moods = [4, 4, 5, 4, 3, 4, 4];

        for (i, n) in (4..=10).enumerate() {
            let date = days_ago(n);
            self.health
                .insert(user, [sleep(date, sleep_hours[i]), steps(date, step_counts[i])])
                .unwrap();
            self.mood(user, date, moods[i]);
        }
    }

    /// Current window (0..=2 days ago) with the given daily values
    pub fn seed_current(&self, user: &str, sleep_hours: f64, step_count: u32, mood: i64) {
        for n in 0..=2 {
            let date = days_ago(n);
            self.health
                .insert(user, [sleep(date, sleep_hours), steps(date, step_count)])
                .unwrap();
            self.mood(user, date, mood);
        }
    }
}
