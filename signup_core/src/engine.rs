//! Waitlist engine: register, cancel and promote.
//!
//! A (user, event) pair moves `Absent -> Registered`, `Absent -> Reserve`,
//! `Reserve -> Registered` (promotion) and back to `Absent` on cancellation.
//! Every transition for an event runs under that event's lock, so the
//! capacity check and the write that follows it form one atomic unit.
//!
//! Promotion happens only when a main-list registration is cancelled; the
//! oldest reserve registration (lowest sequence number) moves up.

use crate::catalog::EventCatalog;
use crate::ledger::RegistrationLedger;
use crate::lock::{EventLocks, RequestContext};
use crate::{
    Error, Event, EventDraft, EventId, PromotionOutcome, Registration, Result, Roster, Status,
    UserId,
};
use chrono::Utc;
use std::time::Duration;

/// Lock wait applied when a request carries no deadline of its own
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct WaitlistEngine<C, L> {
    catalog: C,
    ledger: L,
    locks: EventLocks,
    lock_timeout: Duration,
}

impl<C, L> WaitlistEngine<C, L>
where
    C: EventCatalog,
    L: RegistrationLedger,
{
    pub fn new(catalog: C, ledger: L) -> Self {
        Self::with_locks(catalog, ledger, EventLocks::new())
    }

    pub fn with_locks(catalog: C, ledger: L, locks: EventLocks) -> Self {
        Self {
            catalog,
            ledger,
            locks,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Sign the context's user up for an event
    ///
    /// Takes a main slot when one is free, otherwise a reserve slot, otherwise
    /// fails with [`Error::EventFull`]. No record is written on any error.
    pub fn register(&self, ctx: &RequestContext, event_id: EventId) -> Result<Status> {
        self.catalog.get_event(event_id)?;
        let user_id = &ctx.user_id;

        self.locks.run(event_id, ctx, self.lock_timeout, || {
            // Re-read under the lock; a concurrent removal may have won
            let event = self.catalog.get_event(event_id)?;

            if self.ledger.find(user_id, event_id)?.is_some() {
                tracing::debug!("User {} already holds a slot on event {}", user_id, event_id);
                return Err(Error::AlreadyRegistered {
                    user: user_id.clone(),
                    event: event_id,
                });
            }

            let status = self.open_status(&event)?;
            let sequence = self.ledger.next_sequence(event_id)?;

            self.ledger.insert(Registration {
                user_id: user_id.clone(),
                event_id,
                status,
                sequence,
                registered_at: Utc::now(),
            })?;

            tracing::info!(
                "User {} joined event {} as {} (sequence {})",
                user_id,
                event_id,
                status,
                sequence
            );
            Ok(status)
        })
    }

    /// Which list a newcomer lands on, if either has room
    fn open_status(&self, event: &Event) -> Result<Status> {
        for status in [Status::Registered, Status::Reserve] {
            let held = self.ledger.count_by_status(event.id, status)?;
            if held < event.capacity_for(status) as usize {
                return Ok(status);
            }
        }

        tracing::info!(
            "Event {} is full ({} main, {} reserve)",
            event.id,
            event.main_capacity,
            event.reserve_capacity
        );
        Err(Error::EventFull(event.id))
    }

    /// Cancel the context's registration, promoting the oldest reserve
    /// registration if a main slot was freed
    ///
    /// The event must still exist in the catalog; removed events take their
    /// registrations with them.
    pub fn cancel(&self, ctx: &RequestContext, event_id: EventId) -> Result<PromotionOutcome> {
        self.catalog.get_event(event_id)?;
        let user_id = &ctx.user_id;

        self.locks.run(event_id, ctx, self.lock_timeout, || {
            let event = self.catalog.get_event(event_id)?;
            let outcome = self
                .ledger
                .cancel_and_promote(user_id, event_id, event.main_capacity)?;

            tracing::info!(
                "User {} left event {} ({})",
                user_id,
                event_id,
                outcome.cancelled.status
            );
            if let Some(promoted) = &outcome.promoted {
                tracing::info!(
                    "Promoted user {} from reserve on event {} (sequence {})",
                    promoted.user_id,
                    event_id,
                    promoted.sequence
                );
            }
            Ok(outcome)
        })
    }

    /// Validate and store a new event
    pub fn create_event(&self, draft: EventDraft) -> Result<Event> {
        let event = self.catalog.create_event(draft)?;
        tracing::info!(
            "Created event {} '{}' ({} main, {} reserve)",
            event.id,
            event.name,
            event.main_capacity,
            event.reserve_capacity
        );
        Ok(event)
    }

    /// Remove an event and every registration it holds
    ///
    /// Runs under the event lock so it cannot interleave with a pending
    /// register or cancel. Returns the number of registrations dropped.
    pub fn remove_event(&self, ctx: &RequestContext, event_id: EventId) -> Result<usize> {
        self.catalog.get_event(event_id)?;

        let dropped = self.locks.run(event_id, ctx, self.lock_timeout, || {
            self.catalog.delete_event(event_id)?;
            self.ledger.clear_event(event_id)
        })?;

        tracing::info!(
            "Removed event {} along with {} registrations",
            event_id,
            dropped
        );
        Ok(dropped)
    }

    pub fn list_events(&self) -> Result<Vec<Event>> {
        self.catalog.list_events()
    }

    /// Snapshot of an event's main and reserve lists, each in arrival order
    pub fn roster(&self, event_id: EventId) -> Result<Roster> {
        let event = self.catalog.get_event(event_id)?;
        let all = self.ledger.list_by_event(event_id, None)?;
        let (registered, reserve): (Vec<_>, Vec<_>) = all
            .into_iter()
            .partition(|r| r.status == Status::Registered);

        Ok(Roster {
            event,
            registered,
            reserve,
        })
    }

    /// Every registration the user holds, paired with its event
    ///
    /// Registrations whose event has disappeared are skipped.
    pub fn registrations_for(&self, user_id: &UserId) -> Result<Vec<(Event, Registration)>> {
        let mut found = Vec::new();
        for registration in self.ledger.list_by_user(user_id)? {
            match self.catalog.get_event(registration.event_id) {
                Ok(event) => found.push((event, registration)),
                Err(Error::EventNotFound(id)) => {
                    tracing::debug!("Skipping registration on missing event {}", id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }
}
