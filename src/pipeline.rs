//! Engine orchestration
//!
//! This module provides the public API for Synheart Wellbeing.
//! It wires the normalizer, baseline store, comparator, classifier, rate
//! limiter and support broker to the injected collaborators and exposes the
//! triggerable operations.
//!
//! Work for one user is serialized through a per-user lock; different users
//! proceed in parallel.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::adapters::{
    AnalysisHistory, BaselinePersistence, CheckInLog, CheckInTimerStore, HealthDataSource,
    InMemoryAnalysisHistory, InMemoryBaselineStore, InMemoryCheckInLog, InMemoryHealthSource,
    InMemorySupportRequestStore, InMemoryTimerStore, LoggingMessenger, Messenger,
    SupportRequestStore,
};
use crate::baseline::BaselineStore;
use crate::broker::SupportRequestBroker;
use crate::classifier::StatusClassifier;
use crate::clock::{Clock, SystemClock};
use crate::comparator::Comparator;
use crate::config::{Config, Policy};
use crate::error::{Result, WellbeingError};
use crate::features::FeatureDeriver;
use crate::normalizer::MetricNormalizer;
use crate::rate_limiter::CheckInRateLimiter;
use crate::schema::CheckInSubmission;
use crate::types::{
    AnalysisResult, BaselineSnapshot, Caller, CallerRole, CheckIn, CheckInStatus, MetricSample,
    SupportRequest, UserId,
};

/// Date ranges used by one evaluation (both inclusive, never overlapping)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationWindows {
    pub baseline_start: NaiveDate,
    pub baseline_end: NaiveDate,
    pub current_start: NaiveDate,
    pub current_end: NaiveDate,
}

impl EvaluationWindows {
    /// Current window ends `today`; the baseline window immediately precedes it.
    pub fn ending(today: NaiveDate, policy: &Policy) -> Self {
        let current_start = today - Duration::days(i64::from(policy.evaluation_window_days) - 1);
        let baseline_end = current_start - Duration::days(1);
        let baseline_start = baseline_end - Duration::days(i64::from(policy.baseline_window_days) - 1);
        Self {
            baseline_start,
            baseline_end,
            current_start,
            current_end: today,
        }
    }

    fn in_current(&self, date: NaiveDate) -> bool {
        date >= self.current_start && date <= self.current_end
    }
}

/// Builder for [`WellbeingEngine`]. Every collaborator defaults to its
/// in-memory implementation.
pub struct EngineBuilder {
    policy: Policy,
    clock: Arc<dyn Clock>,
    health_source: Arc<dyn HealthDataSource>,
    check_in_log: Arc<dyn CheckInLog>,
    baselines: Arc<dyn BaselinePersistence>,
    timers: Arc<dyn CheckInTimerStore>,
    support_requests: Arc<dyn SupportRequestStore>,
    history: Arc<dyn AnalysisHistory>,
    messenger: Arc<dyn Messenger>,
}

impl EngineBuilder {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            clock: Arc::new(SystemClock),
            health_source: Arc::new(InMemoryHealthSource::new()),
            check_in_log: Arc::new(InMemoryCheckInLog::new()),
            baselines: Arc::new(InMemoryBaselineStore::new()),
            timers: Arc::new(InMemoryTimerStore::new()),
            support_requests: Arc::new(InMemorySupportRequestStore::new()),
            history: Arc::new(InMemoryAnalysisHistory::new()),
            messenger: Arc::new(LoggingMessenger),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.policy.clone())
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn health_source(mut self, source: Arc<dyn HealthDataSource>) -> Self {
        self.health_source = source;
        self
    }

    pub fn check_in_log(mut self, log: Arc<dyn CheckInLog>) -> Self {
        self.check_in_log = log;
        self
    }

    pub fn baseline_persistence(mut self, baselines: Arc<dyn BaselinePersistence>) -> Self {
        self.baselines = baselines;
        self
    }

    pub fn timer_store(mut self, timers: Arc<dyn CheckInTimerStore>) -> Self {
        self.timers = timers;
        self
    }

    pub fn support_requests(mut self, store: Arc<dyn SupportRequestStore>) -> Self {
        self.support_requests = store;
        self
    }

    pub fn analysis_history(mut self, history: Arc<dyn AnalysisHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = messenger;
        self
    }

    pub fn build(self) -> Result<WellbeingEngine> {
        self.policy.validate()?;

        Ok(WellbeingEngine {
            baseline_store: BaselineStore::new(self.baselines, self.policy.min_baseline_samples),
            rate_limiter: CheckInRateLimiter::new(self.timers, self.policy.check_in_cooldown()),
            broker: SupportRequestBroker::new(
                self.support_requests,
                self.messenger,
                self.policy.support_request_ttl(),
            ),
            policy: self.policy,
            clock: self.clock,
            health_source: self.health_source,
            check_in_log: self.check_in_log,
            history: self.history,
            user_locks: Mutex::new(HashMap::new()),
        })
    }
}

/// Wellbeing signal-fusion engine
pub struct WellbeingEngine {
    policy: Policy,
    clock: Arc<dyn Clock>,
    health_source: Arc<dyn HealthDataSource>,
    check_in_log: Arc<dyn CheckInLog>,
    history: Arc<dyn AnalysisHistory>,
    baseline_store: BaselineStore,
    rate_limiter: CheckInRateLimiter,
    broker: SupportRequestBroker,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl WellbeingEngine {
    /// Engine with in-memory collaborators and the system clock
    pub fn in_memory(policy: Policy) -> Result<Self> {
        EngineBuilder::new(policy).build()
    }

    pub fn builder(policy: Policy) -> EngineBuilder {
        EngineBuilder::new(policy)
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Evaluate the user's recent window against their baseline.
    ///
    /// Pipeline stages:
    /// 1. HealthDataSource / CheckInLog - Fetch raw records for both windows
    /// 2. MetricNormalizer - Per-day metric samples
    /// 3. BaselineStore - Refresh the baseline snapshot from the fetched history
    /// 4. FeatureDeriver - Current-window feature vector
    /// 5. Comparator - Standardized deltas and significance
    /// 6. StatusClassifier - Status, confidence, support need
    /// 7. AnalysisHistory / SupportRequestBroker - Record and escalate
    ///
    /// The result is appended to the history before a support request is
    /// opened. If the broker then fails the error is returned, but the audit
    /// entry stays; the next evaluation retries the escalation.
    pub fn analyze_recent(&self, user_id: &str) -> Result<AnalysisResult> {
        let now = self.clock.now();
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| lock_poisoned(user_id))?;

        let windows = EvaluationWindows::ending(now.date_naive(), &self.policy);
        let samples = self.load_samples(user_id, windows.baseline_start, windows.current_end)?;

        let (current, history): (Vec<MetricSample>, Vec<MetricSample>) =
            samples.into_iter().partition(|s| windows.in_current(s.date));
        if current.is_empty() {
            return Err(WellbeingError::InsufficientData(format!(
                "no data for {user_id} between {} and {}",
                windows.current_start, windows.current_end
            )));
        }

        let snapshot = self.baseline_store.refresh(
            user_id,
            &history,
            windows.baseline_start,
            windows.baseline_end,
            now,
        )?;

        let features = FeatureDeriver::derive(
            user_id,
            windows.current_start,
            windows.current_end,
            &current,
            self.policy.critical_mood_score,
        );
        let comparison = Comparator::compare(&features, &snapshot, &self.policy);
        let classification =
            StatusClassifier::classify(&comparison, &features, Some(&snapshot), &self.policy);

        let result = AnalysisResult {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            status: classification.status,
            confidence_score: classification.confidence_score,
            needs_support: classification.needs_support,
            baseline_comparison: comparison.entries,
            significant_changes: comparison.significant,
            evaluated_at: now,
            window_days: self.policy.evaluation_window_days,
        };

        self.history.append(result.clone())?;

        tracing::info!(
            user_id,
            analysis_id = %result.id,
            status = result.status.as_str(),
            confidence = result.confidence_score,
            needs_support = result.needs_support,
            significant = result.significant_changes.len(),
            cold_start = snapshot.is_cold(),
            "analysis complete"
        );

        if result.needs_support {
            if let Err(e) = self.broker.open_for(&result, now) {
                tracing::warn!(
                    user_id,
                    analysis_id = %result.id,
                    error = %e,
                    "support request could not be opened"
                );
                return Err(e);
            }
        }

        Ok(result)
    }

    /// Validate, rate-limit and store a check-in.
    pub fn submit_check_in(&self, user_id: &str, submission: CheckInSubmission) -> Result<CheckIn> {
        let now = self.clock.now();
        let check_in = submission.into_check_in(user_id, now)?;

        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| lock_poisoned(user_id))?;

        let permit = match self.rate_limiter.try_acquire(user_id, now) {
            Ok(permit) => permit,
            Err(e) => {
                if let WellbeingError::CooldownActive { next_available_at } = &e {
                    tracing::debug!(user_id, %next_available_at, "check-in rejected during cooldown");
                }
                return Err(e);
            }
        };

        if let Err(e) = self.check_in_log.append(check_in.clone()) {
            tracing::warn!(user_id, error = %e, "check-in append failed, restoring timer");
            self.rate_limiter.rollback(user_id, permit)?;
            return Err(e);
        }

        tracing::info!(
            user_id,
            check_in_id = %check_in.id,
            mood = check_in.mood.score,
            "check-in recorded"
        );
        Ok(check_in)
    }

    pub fn get_check_in_status(&self, user_id: &str) -> Result<CheckInStatus> {
        self.rate_limiter.status(user_id, self.clock.now())
    }

    /// Clear a user's cooldown. Support tooling only.
    pub fn reset_check_in_timer(&self, caller: &Caller, user_id: &str) -> Result<()> {
        if caller.role != CallerRole::Support {
            tracing::warn!(caller = %caller.user_id, user_id, "unprivileged timer reset refused");
            return Err(WellbeingError::Forbidden(caller.user_id.clone()));
        }

        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| lock_poisoned(user_id))?;
        self.rate_limiter.reset(user_id)?;

        tracing::info!(caller = %caller.user_id, user_id, "check-in timer reset");
        Ok(())
    }

    pub fn list_open_support_requests(&self) -> Result<Vec<SupportRequest>> {
        self.broker.list_open(self.clock.now())
    }

    pub fn claim_support_request(&self, request_id: Uuid, buddy_id: &str) -> Result<SupportRequest> {
        self.broker.claim(request_id, buddy_id, self.clock.now())
    }

    /// Expire a support request whose time-to-live has elapsed. Requests
    /// still within their time-to-live are returned unchanged.
    pub fn expire_support_request(&self, request_id: Uuid) -> Result<SupportRequest> {
        self.broker.expire(request_id, self.clock.now())
    }

    pub fn expire_stale_support_requests(&self) -> Result<usize> {
        self.broker.expire_stale(self.clock.now())
    }

    /// Recompute the baseline for the window preceding today's evaluation
    /// window and make it active.
    pub fn recompute_baseline(&self, user_id: &str) -> Result<Arc<BaselineSnapshot>> {
        let now = self.clock.now();
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| lock_poisoned(user_id))?;

        let windows = EvaluationWindows::ending(now.date_naive(), &self.policy);
        let history = match self.load_samples(user_id, windows.baseline_start, windows.baseline_end) {
            Ok(samples) => samples,
            Err(WellbeingError::InsufficientData(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        self.baseline_store.refresh(
            user_id,
            &history,
            windows.baseline_start,
            windows.baseline_end,
            now,
        )
    }

    pub fn analysis_history(&self, user_id: &str) -> Result<Vec<AnalysisResult>> {
        self.history.list_for_user(user_id)
    }

    fn load_samples(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MetricSample>> {
        let records = self.health_source.fetch_daily(user_id, start, end)?;
        let check_ins = self.check_in_log.query(user_id, start, end)?;
        MetricNormalizer::normalize(user_id, start, end, &records, &check_ins)
    }

    /// Per-user lock. Entries held only by the table are idle and are
    /// pruned whenever a new user is added, so the table tracks users with
    /// work in flight rather than every user ever seen.
    fn user_lock(&self, user_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .user_locks
            .lock()
            .map_err(|_| WellbeingError::Collaborator("user lock table poisoned".to_string()))?;
        if let Some(lock) = locks.get(user_id) {
            return Ok(Arc::clone(lock));
        }

        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(user_id.to_string(), Arc::clone(&lock));
        Ok(lock)
    }
}

fn lock_poisoned(user_id: &str) -> WellbeingError {
    WellbeingError::Collaborator(format!("lock for {user_id} poisoned"))
}
