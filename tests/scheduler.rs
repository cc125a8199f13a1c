mod common;

use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{days_ago, sleep, Harness};
use synheart_wellbeing::adapters::{HealthDataSource, InMemoryHealthSource};
use synheart_wellbeing::clock::ManualClock;
use synheart_wellbeing::config::SchedulerConfig;
use synheart_wellbeing::error::Result;
use synheart_wellbeing::{EngineBuilder, EvaluationScheduler, HealthRecord, Policy};

const INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::test(start_paused = true)]
async fn evaluates_on_each_tick() {
    let h = Harness::new();
    h.seed_baseline("alice");
    h.seed_current("alice", 7.5, 9000, 4);

    let scheduler = EvaluationScheduler::new(Arc::clone(&h.engine), INTERVAL);
    assert!(scheduler.schedule("alice").unwrap());

    // Ticks at 0, 1h and 2h
    tokio::time::sleep(INTERVAL * 5 / 2).await;
    assert_eq!(h.engine.analysis_history("alice").unwrap().len(), 3);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn schedule_is_idempotent_per_user() {
    let h = Harness::new();
    let config = SchedulerConfig {
        interval_minutes: 60,
    };
    let scheduler = EvaluationScheduler::from_config(Arc::clone(&h.engine), &config);

    assert!(scheduler.schedule("alice").unwrap());
    assert!(!scheduler.schedule("alice").unwrap());
    assert!(scheduler.schedule("bob").unwrap());
    assert_eq!(
        scheduler.scheduled_users().unwrap(),
        vec!["alice".to_string(), "bob".to_string()]
    );

    scheduler.shutdown().await.unwrap();
    assert!(scheduler.scheduled_users().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_future_runs() {
    let h = Harness::new();
    h.seed_baseline("alice");
    h.seed_current("alice", 7.5, 9000, 4);

    let scheduler = EvaluationScheduler::new(Arc::clone(&h.engine), INTERVAL);
    scheduler.schedule("alice").unwrap();

    tokio::time::sleep(INTERVAL / 2).await;
    assert_eq!(h.engine.analysis_history("alice").unwrap().len(), 1);

    assert!(scheduler.cancel("alice").unwrap());
    assert!(!scheduler.cancel("alice").unwrap());

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(h.engine.analysis_history("alice").unwrap().len(), 1);
    assert!(scheduler.scheduled_users().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_data_does_not_stop_schedule() {
    let h = Harness::new();
    let scheduler = EvaluationScheduler::new(Arc::clone(&h.engine), INTERVAL);
    scheduler.schedule("alice").unwrap();

    tokio::time::sleep(INTERVAL / 2).await;
    assert!(h.engine.analysis_history("alice").unwrap().is_empty());

    // Data arrives before the next tick
    h.seed_baseline("alice");
    h.seed_current("alice", 7.5, 9000, 4);
    tokio::time::sleep(INTERVAL).await;
    assert_eq!(h.engine.analysis_history("alice").unwrap().len(), 1);
    assert_eq!(scheduler.scheduled_users().unwrap(), vec!["alice".to_string()]);

    scheduler.shutdown().await.unwrap();
}

/// Health source that holds one user's fetches until released
struct GatedHealthSource {
    inner: InMemoryHealthSource,
    gated_user: &'static str,
    released: AtomicBool,
}

impl HealthDataSource for GatedHealthSource {
    fn fetch_daily(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HealthRecord>> {
        if user_id == self.gated_user {
            while !self.released.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        self.inner.fetch_daily(user_id, start, end)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn slow_source_does_not_starve_other_users() {
    let source = Arc::new(GatedHealthSource {
        inner: InMemoryHealthSource::new(),
        gated_user: "alice",
        released: AtomicBool::new(false),
    });
    for user in ["alice", "bob"] {
        source
            .inner
            .insert(user, (0..=2).map(|n| sleep(days_ago(n), 7.5)))
            .unwrap();
    }

    let engine = Arc::new(
        EngineBuilder::new(Policy::default())
            .clock(Arc::new(ManualClock::new(common::now())))
            .health_source(source.clone())
            .build()
            .unwrap(),
    );
    let scheduler = EvaluationScheduler::new(Arc::clone(&engine), INTERVAL);
    scheduler.schedule("alice").unwrap();
    scheduler.schedule("bob").unwrap();

    // The single runtime worker stays free while alice's fetch is held
    let bob_evaluated = tokio::time::timeout(Duration::from_secs(10), async {
        while engine.analysis_history("bob").unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(bob_evaluated.is_ok());
    assert!(engine.analysis_history("alice").unwrap().is_empty());

    // Shutdown waits for alice's in-flight run, which is still recorded
    source.released.store(true, Ordering::SeqCst);
    scheduler.shutdown().await.unwrap();
    assert_eq!(engine.analysis_history("alice").unwrap().len(), 1);
}

#[test]
fn schedule_outside_runtime_is_an_error() {
    let h = Harness::new();
    let scheduler = EvaluationScheduler::new(Arc::clone(&h.engine), INTERVAL);
    assert!(scheduler.schedule("alice").is_err());
}
