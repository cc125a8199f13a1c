//! Support request brokering
//!
//! Turns an analysis that needs support into a discoverable request and lets
//! another user claim it. A requester has at most one open request at a
//! time. Claiming is first-come-first-served; every transition out of `Open`
//! is a compare-and-swap so concurrent claims and expiries resolve to exactly
//! one winner.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::{Messenger, SupportRequestStore};
use crate::error::{Result, WellbeingError};
use crate::types::{AnalysisResult, SupportRequest, SupportRequestState};

const CLAIMED_MESSAGE: &str = "Someone from your circle is reaching out to check in on you.";

pub struct SupportRequestBroker {
    store: Arc<dyn SupportRequestStore>,
    messenger: Arc<dyn Messenger>,
    ttl: Duration,
}

impl SupportRequestBroker {
    pub fn new(
        store: Arc<dyn SupportRequestStore>,
        messenger: Arc<dyn Messenger>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            messenger,
            ttl,
        }
    }

    /// Open a request for the analysis' user unless one is already open.
    ///
    /// Returns the open request and whether it was created by this call.
    /// A stale open request is expired first so a fresh one can replace it.
    pub fn open_for(
        &self,
        analysis: &AnalysisResult,
        now: DateTime<Utc>,
    ) -> Result<(SupportRequest, bool)> {
        if let Some(existing) = self.store.open_for(&analysis.user_id)? {
            if existing.is_stale(now) {
                self.transition_to_expired(&existing)?;
            }
        }

        let request = SupportRequest {
            id: Uuid::new_v4(),
            requester_id: analysis.user_id.clone(),
            triggering_analysis_id: analysis.id,
            mental_health_status: analysis.status,
            created_at: now,
            expires_at: now + self.ttl,
            claimed_by: None,
            claimed_at: None,
            state: SupportRequestState::Open,
        };

        let (request, created) = self.store.insert_if_none_open(request)?;
        if created {
            tracing::info!(
                request_id = %request.id,
                requester_id = %request.requester_id,
                status = request.mental_health_status.as_str(),
                "support request opened"
            );
        } else {
            tracing::debug!(
                request_id = %request.id,
                requester_id = %request.requester_id,
                "support request already open"
            );
        }
        Ok((request, created))
    }

    /// Claim an open request on behalf of `buddy_id`.
    pub fn claim(&self, id: Uuid, buddy_id: &str, now: DateTime<Utc>) -> Result<SupportRequest> {
        let request = self
            .store
            .get(id)?
            .ok_or(WellbeingError::SupportRequestNotFound(id))?;

        match request.state {
            SupportRequestState::Claimed => return Err(WellbeingError::AlreadyClaimed(id)),
            SupportRequestState::Expired => return Err(WellbeingError::AlreadyExpired(id)),
            SupportRequestState::Open => {}
        }
        if request.requester_id == buddy_id {
            return Err(WellbeingError::SelfClaim(buddy_id.to_string()));
        }
        if request.is_stale(now) {
            self.transition_to_expired(&request)?;
            return Err(WellbeingError::AlreadyExpired(id));
        }

        let claimed = SupportRequest {
            claimed_by: Some(buddy_id.to_string()),
            claimed_at: Some(now),
            state: SupportRequestState::Claimed,
            ..request.clone()
        };

        if !self.store.compare_and_swap(&request, claimed.clone())? {
            // Lost the race; report what the winner did
            return match self.store.get(id)?.map(|r| r.state) {
                Some(SupportRequestState::Expired) => Err(WellbeingError::AlreadyExpired(id)),
                _ => Err(WellbeingError::AlreadyClaimed(id)),
            };
        }

        tracing::info!(
            request_id = %id,
            requester_id = %claimed.requester_id,
            buddy_id,
            "support request claimed"
        );
        self.messenger.open_channel(&claimed.requester_id, buddy_id);
        self.messenger.notify(&claimed.requester_id, CLAIMED_MESSAGE);

        Ok(claimed)
    }

    /// Expire a request whose time-to-live has elapsed. Idempotent for
    /// already-expired requests; a claimed request cannot be expired. An open
    /// request still within its time-to-live is returned unchanged.
    pub fn expire(&self, id: Uuid, now: DateTime<Utc>) -> Result<SupportRequest> {
        let request = self
            .store
            .get(id)?
            .ok_or(WellbeingError::SupportRequestNotFound(id))?;

        match request.state {
            SupportRequestState::Expired => Ok(request),
            SupportRequestState::Claimed => Err(WellbeingError::AlreadyClaimed(id)),
            SupportRequestState::Open if !request.is_stale(now) => {
                tracing::debug!(
                    request_id = %id,
                    expires_at = %request.expires_at,
                    "support request not yet due to expire"
                );
                Ok(request)
            }
            SupportRequestState::Open => {
                if self.transition_to_expired(&request)? {
                    Ok(SupportRequest {
                        state: SupportRequestState::Expired,
                        ..request
                    })
                } else {
                    // Concurrently claimed or expired
                    let latest = self
                        .store
                        .get(id)?
                        .ok_or(WellbeingError::SupportRequestNotFound(id))?;
                    match latest.state {
                        SupportRequestState::Claimed => Err(WellbeingError::AlreadyClaimed(id)),
                        _ => Ok(latest),
                    }
                }
            }
        }
    }

    /// Expire every open request past its time-to-live. Returns how many
    /// this call transitioned.
    pub fn expire_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut expired = 0;
        for request in self.store.list_by_state(SupportRequestState::Open)? {
            if request.is_stale(now) && self.transition_to_expired(&request)? {
                expired += 1;
            }
        }
        if expired > 0 {
            tracing::info!(expired, "stale support requests expired");
        }
        Ok(expired)
    }

    /// Open, unexpired requests, oldest first. Stale ones are expired on the way.
    pub fn list_open(&self, now: DateTime<Utc>) -> Result<Vec<SupportRequest>> {
        let mut open = Vec::new();
        for request in self.store.list_by_state(SupportRequestState::Open)? {
            if request.is_stale(now) {
                self.transition_to_expired(&request)?;
            } else {
                open.push(request);
            }
        }
        Ok(open)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<SupportRequest>> {
        self.store.get(id)
    }

    fn transition_to_expired(&self, request: &SupportRequest) -> Result<bool> {
        let expired = SupportRequest {
            state: SupportRequestState::Expired,
            ..request.clone()
        };
        let swapped = self.store.compare_and_swap(request, expired)?;
        if swapped {
            tracing::debug!(request_id = %request.id, "support request expired");
        }
        Ok(swapped)
    }
}
