//! Check-in rate limiting
//!
//! One accepted check-in per user per cooldown interval. The check and the
//! timer update are a single compare-and-swap against the timer store, so
//! two concurrent submissions can never both be admitted.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::adapters::CheckInTimerStore;
use crate::error::{Result, WellbeingError};
use crate::types::{CheckInStatus, CheckInTimer};

/// Upper bound on compare-and-swap retries under contention
const MAX_CAS_ATTEMPTS: usize = 16;

/// Proof of an admitted check-in, used to undo the timer update when the
/// check-in itself fails to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInPermit {
    previous: Option<CheckInTimer>,
    granted: CheckInTimer,
}

impl CheckInPermit {
    pub fn next_check_in_time(&self) -> Option<DateTime<Utc>> {
        self.granted.cooldown_until
    }
}

pub struct CheckInRateLimiter {
    store: Arc<dyn CheckInTimerStore>,
    cooldown: Duration,
}

impl CheckInRateLimiter {
    pub fn new(store: Arc<dyn CheckInTimerStore>, cooldown: Duration) -> Self {
        Self { store, cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Admit a check-in at `now` and start the cooldown, or fail with
    /// `CooldownActive` carrying the next allowed time.
    pub fn try_acquire(&self, user_id: &str, now: DateTime<Utc>) -> Result<CheckInPermit> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self.store.load(user_id)?;

            if let Some(timer) = &current {
                if timer.is_cooling(now) {
                    return Err(WellbeingError::CooldownActive {
                        // is_cooling guarantees cooldown_until is set
                        next_available_at: timer.cooldown_until.unwrap_or(now),
                    });
                }
            }

            let granted = CheckInTimer {
                user_id: user_id.to_string(),
                last_check_in_at: Some(now),
                cooldown_until: Some(now + self.cooldown),
            };

            if self
                .store
                .compare_and_swap(user_id, current.as_ref(), granted.clone())?
            {
                return Ok(CheckInPermit {
                    previous: current,
                    granted,
                });
            }
            tracing::trace!(user_id, "check-in timer contended, retrying");
        }

        Err(WellbeingError::Collaborator(format!(
            "check-in timer for {user_id} contended past {MAX_CAS_ATTEMPTS} attempts"
        )))
    }

    /// Restore the timer an admitted permit replaced. A timer that has moved
    /// on since (for example through a reset) is left alone.
    pub fn rollback(&self, user_id: &str, permit: CheckInPermit) -> Result<bool> {
        let restored = permit
            .previous
            .unwrap_or_else(|| CheckInTimer::new(user_id));
        self.store
            .compare_and_swap(user_id, Some(&permit.granted), restored)
    }

    pub fn status(&self, user_id: &str, now: DateTime<Utc>) -> Result<CheckInStatus> {
        let timer = self.store.load(user_id)?;
        Ok(match timer {
            Some(t) if t.is_cooling(now) => CheckInStatus {
                can_check_in: false,
                next_check_in_time: t.cooldown_until,
            },
            _ => CheckInStatus {
                can_check_in: true,
                next_check_in_time: None,
            },
        })
    }

    /// Clear any active cooldown. The last check-in time is kept.
    pub fn reset(&self, user_id: &str) -> Result<()> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(current) = self.store.load(user_id)? else {
                return Ok(());
            };
            if current.cooldown_until.is_none() {
                return Ok(());
            }

            let cleared = CheckInTimer {
                cooldown_until: None,
                ..current.clone()
            };
            if self
                .store
                .compare_and_swap(user_id, Some(&current), cleared)?
            {
                return Ok(());
            }
        }

        Err(WellbeingError::Collaborator(format!(
            "check-in timer for {user_id} contended past {MAX_CAS_ATTEMPTS} attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryTimerStore;
    use chrono::TimeZone;
    use std::thread;

    fn limiter(minutes: i64) -> CheckInRateLimiter {
        CheckInRateLimiter::new(Arc::new(InMemoryTimerStore::new()), Duration::minutes(minutes))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_first_check_in_admitted() {
        let limiter = limiter(240);
        let status = limiter.status("u1", t0()).unwrap();
        assert!(status.can_check_in);
        assert_eq!(status.next_check_in_time, None);

        let permit = limiter.try_acquire("u1", t0()).unwrap();
        assert_eq!(permit.next_check_in_time(), Some(t0() + Duration::minutes(240)));
    }

    #[test]
    fn test_cooldown_blocks_until_expiry() {
        let limiter = limiter(240);
        limiter.try_acquire("u1", t0()).unwrap();

        let err = limiter
            .try_acquire("u1", t0() + Duration::minutes(10))
            .unwrap_err();
        match err {
            WellbeingError::CooldownActive { next_available_at } => {
                assert_eq!(next_available_at, t0() + Duration::minutes(240));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let status = limiter.status("u1", t0() + Duration::minutes(10)).unwrap();
        assert!(!status.can_check_in);

        // Exactly at the boundary the cooldown has elapsed
        assert!(limiter
            .try_acquire("u1", t0() + Duration::minutes(240))
            .is_ok());
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = limiter(240);
        limiter.try_acquire("u1", t0()).unwrap();
        assert!(limiter.try_acquire("u2", t0()).is_ok());
    }

    #[test]
    fn test_reset_clears_cooldown() {
        let limiter = limiter(240);
        limiter.try_acquire("u1", t0()).unwrap();
        limiter.reset("u1").unwrap();

        assert!(limiter.status("u1", t0()).unwrap().can_check_in);
        assert!(limiter.try_acquire("u1", t0() + Duration::minutes(1)).is_ok());

        // Resetting an unknown user is a no-op
        limiter.reset("nobody").unwrap();
    }

    #[test]
    fn test_rollback_restores_previous_timer() {
        let limiter = limiter(240);
        let permit = limiter.try_acquire("u1", t0()).unwrap();
        assert!(limiter.rollback("u1", permit).unwrap());
        assert!(limiter.status("u1", t0()).unwrap().can_check_in);
    }

    #[test]
    fn test_concurrent_submissions_admit_one() {
        let limiter = Arc::new(limiter(240));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || limiter.try_acquire("u1", t0()).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
