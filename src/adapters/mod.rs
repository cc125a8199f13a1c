//! Collaborator adapters
//!
//! The engine reaches every external system through the narrow traits in this
//! module: raw health data, the check-in log, baseline persistence, cooldown
//! timers, support requests, the analysis audit log and messaging. Each is
//! injected at construction so a durable implementation can replace the
//! in-memory ones provided here.
//!
//! Failures are returned as `WellbeingError::Collaborator` and propagated to
//! the caller unchanged; nothing in the engine retries them.

mod memory;

pub use memory::{
    InMemoryAnalysisHistory, InMemoryBaselineStore, InMemoryCheckInLog, InMemoryHealthSource,
    InMemorySupportRequestStore, InMemoryTimerStore, LoggingMessenger, MessengerEvent,
    RecordingMessenger,
};

use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::schema::HealthRecord;
use crate::types::{
    AnalysisResult, BaselineSnapshot, CheckIn, CheckInTimer, SupportRequest, SupportRequestState,
};

/// Source of raw per-day sleep/activity/exercise/step records
pub trait HealthDataSource: Send + Sync {
    /// Records for `user_id` dated within `[start, end]`. Partial days or no
    /// days at all are valid answers.
    fn fetch_daily(&self, user_id: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<HealthRecord>>;
}

/// Durable append-only log of accepted check-ins
pub trait CheckInLog: Send + Sync {
    fn append(&self, check_in: CheckIn) -> Result<()>;

    /// Check-ins whose UTC date falls within `[start, end]`, oldest first
    fn query(&self, user_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<CheckIn>>;
}

/// Baseline persistence with atomic read-of-latest and swap-to-new
pub trait BaselinePersistence: Send + Sync {
    fn load_latest(&self, user_id: &str) -> Result<Option<Arc<BaselineSnapshot>>>;

    /// Replace the user's active snapshot in one step
    fn swap(&self, snapshot: BaselineSnapshot) -> Result<Arc<BaselineSnapshot>>;
}

/// Per-user cooldown state with compare-and-swap updates
pub trait CheckInTimerStore: Send + Sync {
    fn load(&self, user_id: &str) -> Result<Option<CheckInTimer>>;

    /// Store `new` only if the current value equals `expected`
    fn compare_and_swap(
        &self,
        user_id: &str,
        expected: Option<&CheckInTimer>,
        new: CheckInTimer,
    ) -> Result<bool>;
}

/// Support request storage
pub trait SupportRequestStore: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<SupportRequest>>;

    /// The requester's open request, if any
    fn open_for(&self, requester_id: &str) -> Result<Option<SupportRequest>>;

    /// Insert `request` unless its requester already has an open one, as a
    /// single atomic step. Returns the open request and whether it was created.
    fn insert_if_none_open(&self, request: SupportRequest) -> Result<(SupportRequest, bool)>;

    /// Replace `expected` with `new` only if the stored value is unchanged
    fn compare_and_swap(&self, expected: &SupportRequest, new: SupportRequest) -> Result<bool>;

    fn list_by_state(&self, state: SupportRequestState) -> Result<Vec<SupportRequest>>;
}

/// Append-only audit log of analysis results
pub trait AnalysisHistory: Send + Sync {
    fn append(&self, result: AnalysisResult) -> Result<()>;

    fn list_for_user(&self, user_id: &str) -> Result<Vec<AnalysisResult>>;
}

/// Notification and messaging collaborator. Fire-and-forget: the engine never
/// waits for delivery.
pub trait Messenger: Send + Sync {
    fn notify(&self, user_id: &str, message: &str);

    fn open_channel(&self, requester_id: &str, buddy_id: &str);
}
