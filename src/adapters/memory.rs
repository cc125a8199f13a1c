//! In-memory collaborator implementations
//!
//! Used by tests, the CLI and embedded hosts that keep state in process.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

use super::{
    AnalysisHistory, BaselinePersistence, CheckInLog, CheckInTimerStore, HealthDataSource,
    Messenger, SupportRequestStore,
};
use crate::error::{Result, WellbeingError};
use crate::schema::HealthRecord;
use crate::types::{
    AnalysisResult, BaselineSnapshot, CheckIn, CheckInTimer, SupportRequest, SupportRequestState,
    UserId,
};

fn poisoned<T>(_: T) -> WellbeingError {
    WellbeingError::Collaborator("in-memory store lock poisoned".to_string())
}

/// Health records held in memory, keyed by user
#[derive(Debug, Default)]
pub struct InMemoryHealthSource {
    records: RwLock<HashMap<UserId, Vec<HealthRecord>>>,
}

impl InMemoryHealthSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records for a user
    pub fn insert(&self, user_id: &str, records: impl IntoIterator<Item = HealthRecord>) -> Result<()> {
        let mut guard = self.records.write().map_err(poisoned)?;
        guard.entry(user_id.to_string()).or_default().extend(records);
        Ok(())
    }
}

impl HealthDataSource for InMemoryHealthSource {
    fn fetch_daily(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HealthRecord>> {
        let guard = self.records.read().map_err(poisoned)?;
        Ok(guard
            .get(user_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.date() >= start && r.date() <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Append-only check-in log
#[derive(Debug, Default)]
pub struct InMemoryCheckInLog {
    entries: RwLock<Vec<CheckIn>>,
}

impl InMemoryCheckInLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CheckInLog for InMemoryCheckInLog {
    fn append(&self, check_in: CheckIn) -> Result<()> {
        self.entries.write().map_err(poisoned)?.push(check_in);
        Ok(())
    }

    fn query(&self, user_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<CheckIn>> {
        let guard = self.entries.read().map_err(poisoned)?;
        let mut matches: Vec<CheckIn> = guard
            .iter()
            .filter(|c| c.user_id == user_id)
            .filter(|c| {
                let date = c.timestamp.date_naive();
                date >= start && date <= end
            })
            .cloned()
            .collect();
        matches.sort_by_key(|c| c.timestamp);
        Ok(matches)
    }
}

/// Active baseline snapshots. Readers clone an `Arc`, so a swap is never
/// observed half-applied.
#[derive(Debug, Default)]
pub struct InMemoryBaselineStore {
    active: RwLock<HashMap<UserId, Arc<BaselineSnapshot>>>,
}

impl InMemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselinePersistence for InMemoryBaselineStore {
    fn load_latest(&self, user_id: &str) -> Result<Option<Arc<BaselineSnapshot>>> {
        Ok(self.active.read().map_err(poisoned)?.get(user_id).cloned())
    }

    fn swap(&self, snapshot: BaselineSnapshot) -> Result<Arc<BaselineSnapshot>> {
        let snapshot = Arc::new(snapshot);
        self.active
            .write()
            .map_err(poisoned)?
            .insert(snapshot.user_id.clone(), Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// Cooldown timers guarded by a single mutex
#[derive(Debug, Default)]
pub struct InMemoryTimerStore {
    timers: Mutex<HashMap<UserId, CheckInTimer>>,
}

impl InMemoryTimerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckInTimerStore for InMemoryTimerStore {
    fn load(&self, user_id: &str) -> Result<Option<CheckInTimer>> {
        Ok(self.timers.lock().map_err(poisoned)?.get(user_id).cloned())
    }

    fn compare_and_swap(
        &self,
        user_id: &str,
        expected: Option<&CheckInTimer>,
        new: CheckInTimer,
    ) -> Result<bool> {
        let mut guard = self.timers.lock().map_err(poisoned)?;
        if guard.get(user_id) != expected {
            return Ok(false);
        }
        guard.insert(user_id.to_string(), new);
        Ok(true)
    }
}

/// Support requests guarded by a single mutex
#[derive(Debug, Default)]
pub struct InMemorySupportRequestStore {
    requests: Mutex<HashMap<Uuid, SupportRequest>>,
}

impl InMemorySupportRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SupportRequestStore for InMemorySupportRequestStore {
    fn get(&self, id: Uuid) -> Result<Option<SupportRequest>> {
        Ok(self.requests.lock().map_err(poisoned)?.get(&id).cloned())
    }

    fn open_for(&self, requester_id: &str) -> Result<Option<SupportRequest>> {
        let guard = self.requests.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .find(|r| r.requester_id == requester_id && r.is_open())
            .cloned())
    }

    fn insert_if_none_open(&self, request: SupportRequest) -> Result<(SupportRequest, bool)> {
        let mut guard = self.requests.lock().map_err(poisoned)?;
        if let Some(existing) = guard
            .values()
            .find(|r| r.requester_id == request.requester_id && r.is_open())
        {
            return Ok((existing.clone(), false));
        }
        guard.insert(request.id, request.clone());
        Ok((request, true))
    }

    fn compare_and_swap(&self, expected: &SupportRequest, new: SupportRequest) -> Result<bool> {
        let mut guard = self.requests.lock().map_err(poisoned)?;
        if guard.get(&expected.id) != Some(expected) {
            return Ok(false);
        }
        guard.insert(new.id, new);
        Ok(true)
    }

    fn list_by_state(&self, state: SupportRequestState) -> Result<Vec<SupportRequest>> {
        let guard = self.requests.lock().map_err(poisoned)?;
        let mut matches: Vec<SupportRequest> =
            guard.values().filter(|r| r.state == state).cloned().collect();
        matches.sort_by_key(|r| r.created_at);
        Ok(matches)
    }
}

/// Append-only analysis audit log
#[derive(Debug, Default)]
pub struct InMemoryAnalysisHistory {
    results: RwLock<Vec<AnalysisResult>>,
}

impl InMemoryAnalysisHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalysisHistory for InMemoryAnalysisHistory {
    fn append(&self, result: AnalysisResult) -> Result<()> {
        self.results.write().map_err(poisoned)?.push(result);
        Ok(())
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<AnalysisResult>> {
        let guard = self.results.read().map_err(poisoned)?;
        Ok(guard.iter().filter(|r| r.user_id == user_id).cloned().collect())
    }
}

/// Messenger that only emits tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMessenger;

impl Messenger for LoggingMessenger {
    fn notify(&self, user_id: &str, message: &str) {
        tracing::info!(user_id, message, "notification dispatched");
    }

    fn open_channel(&self, requester_id: &str, buddy_id: &str) {
        tracing::info!(requester_id, buddy_id, "channel open requested");
    }
}

/// Messenger call captured by [`RecordingMessenger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessengerEvent {
    Notify { user_id: String, message: String },
    OpenChannel { requester_id: String, buddy_id: String },
}

/// Messenger that records every call, for hosts that drain events themselves
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    events: Mutex<Vec<MessengerEvent>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded events, oldest first
    pub fn drain(&self) -> Vec<MessengerEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    fn record(&self, event: MessengerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Messenger for RecordingMessenger {
    fn notify(&self, user_id: &str, message: &str) {
        self.record(MessengerEvent::Notify {
            user_id: user_id.to_string(),
            message: message.to_string(),
        });
    }

    fn open_channel(&self, requester_id: &str, buddy_id: &str) {
        self.record(MessengerEvent::OpenChannel {
            requester_id: requester_id.to_string(),
            buddy_id: buddy_id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StepRecord;
    use crate::types::MentalHealthStatus;
    use chrono::{Duration, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn request(requester: &str) -> SupportRequest {
        let now = Utc::now();
        SupportRequest {
            id: Uuid::new_v4(),
            requester_id: requester.to_string(),
            triggering_analysis_id: Uuid::new_v4(),
            mental_health_status: MentalHealthStatus::Critical,
            created_at: now,
            expires_at: now + Duration::hours(24),
            claimed_by: None,
            claimed_at: None,
            state: SupportRequestState::Open,
        }
    }

    #[test]
    fn test_health_source_filters_range() {
        let source = InMemoryHealthSource::new();
        source
            .insert(
                "u1",
                (1..=5).map(|d| HealthRecord::Steps(StepRecord { date: day(d), count: 100 })),
            )
            .unwrap();

        let records = source.fetch_daily("u1", day(2), day(4)).unwrap();
        assert_eq!(records.len(), 3);
        assert!(source.fetch_daily("u2", day(1), day(5)).unwrap().is_empty());
    }

    #[test]
    fn test_timer_compare_and_swap() {
        let store = InMemoryTimerStore::new();
        let first = CheckInTimer::new("u1");

        assert!(store.compare_and_swap("u1", None, first.clone()).unwrap());
        // Stale expectation loses
        assert!(!store.compare_and_swap("u1", None, first.clone()).unwrap());

        let mut second = first.clone();
        second.last_check_in_at = Some(Utc::now());
        assert!(store.compare_and_swap("u1", Some(&first), second.clone()).unwrap());
        assert_eq!(store.load("u1").unwrap(), Some(second));
    }

    #[test]
    fn test_single_open_request_per_user() {
        let store = InMemorySupportRequestStore::new();
        let first = request("u1");
        let (stored, created) = store.insert_if_none_open(first.clone()).unwrap();
        assert!(created);
        assert_eq!(stored.id, first.id);

        let (stored, created) = store.insert_if_none_open(request("u1")).unwrap();
        assert!(!created);
        assert_eq!(stored.id, first.id);

        let (_, created) = store.insert_if_none_open(request("u2")).unwrap();
        assert!(created);
        assert_eq!(store.list_by_state(SupportRequestState::Open).unwrap().len(), 2);
    }

    #[test]
    fn test_recording_messenger_drains() {
        let messenger = RecordingMessenger::new();
        messenger.open_channel("u1", "b1");
        assert_eq!(
            messenger.drain(),
            vec![MessengerEvent::OpenChannel {
                requester_id: "u1".to_string(),
                buddy_id: "b1".to_string()
            }]
        );
        assert!(messenger.drain().is_empty());
    }
}
