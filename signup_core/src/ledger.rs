//! Registration ledger: the ordered registrations of each event.
//!
//! The [`RegistrationLedger`] trait is the storage contract; [`EventLedger`]
//! is the per-event data structure every backend keeps, ordered by sequence
//! number. Only the waitlist engine mutates a ledger.

use crate::{Error, EventId, PromotionOutcome, Registration, Result, Status, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage contract for registrations
///
/// Every operation is scoped to one event (except [`list_by_user`]) and is a
/// single atomic unit against the store.
///
/// [`list_by_user`]: RegistrationLedger::list_by_user
pub trait RegistrationLedger: Send + Sync {
    /// Registrations for an event ordered by sequence number, optionally
    /// restricted to one status
    fn list_by_event(&self, event_id: EventId, status: Option<Status>)
        -> Result<Vec<Registration>>;

    /// Fails with [`Error::NotFound`] if the user holds no registration
    fn get(&self, user_id: &UserId, event_id: EventId) -> Result<Registration>;

    /// Fails with [`Error::DuplicateRegistration`] if the pair already exists
    fn insert(&self, registration: Registration) -> Result<()>;

    fn update_status(&self, user_id: &UserId, event_id: EventId, status: Status) -> Result<()>;

    /// Remove and return a registration; [`Error::NotFound`] if absent
    fn delete(&self, user_id: &UserId, event_id: EventId) -> Result<Registration>;

    fn count_by_status(&self, event_id: EventId, status: Status) -> Result<usize> {
        Ok(self.list_by_event(event_id, Some(status))?.len())
    }

    /// Sequence number the next registration for this event must use
    fn next_sequence(&self, event_id: EventId) -> Result<u64>;

    /// Every registration a user holds, across events
    fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Registration>>;

    /// Drop an event's whole ledger, returning how many registrations it held
    fn clear_event(&self, event_id: EventId) -> Result<usize>;

    /// Remove a registration and, if that frees one of `main_capacity` main
    /// slots, move the oldest reserve registration up
    ///
    /// Stores that can rewrite an event's ledger in one step override this so
    /// the removal and the promotion land together. The default composes
    /// [`delete`] and [`update_status`] and re-inserts the removed record if
    /// the promotion write fails.
    ///
    /// [`delete`]: RegistrationLedger::delete
    /// [`update_status`]: RegistrationLedger::update_status
    fn cancel_and_promote(
        &self,
        user_id: &UserId,
        event_id: EventId,
        main_capacity: u32,
    ) -> Result<PromotionOutcome> {
        let cancelled = self.delete(user_id, event_id)?;
        if cancelled.status != Status::Registered {
            return Ok(PromotionOutcome {
                cancelled,
                promoted: None,
            });
        }

        let promoted: Result<Option<Registration>> = (|| {
            if self.count_by_status(event_id, Status::Registered)? >= main_capacity as usize {
                return Ok(None);
            }
            let Some(mut next) = self
                .list_by_event(event_id, Some(Status::Reserve))?
                .into_iter()
                .min_by_key(|r| r.sequence)
            else {
                return Ok(None);
            };
            self.update_status(&next.user_id, event_id, Status::Registered)?;
            next.status = Status::Registered;
            Ok(Some(next))
        })();

        match promoted {
            Ok(promoted) => Ok(PromotionOutcome {
                cancelled,
                promoted,
            }),
            Err(e) => {
                tracing::warn!(
                    "Promotion on event {} failed ({}), restoring registration of {}",
                    event_id,
                    e,
                    user_id
                );
                if let Err(restore) = self.insert(cancelled) {
                    tracing::error!(
                        "Failed to restore registration of {} on event {}: {}",
                        user_id,
                        event_id,
                        restore
                    );
                }
                Err(e)
            }
        }
    }

    /// [`get`](RegistrationLedger::get) with absence mapped to `None`
    fn find(&self, user_id: &UserId, event_id: EventId) -> Result<Option<Registration>> {
        match self.get(user_id, event_id) {
            Ok(registration) => Ok(Some(registration)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<T: RegistrationLedger + ?Sized> RegistrationLedger for Arc<T> {
    fn list_by_event(
        &self,
        event_id: EventId,
        status: Option<Status>,
    ) -> Result<Vec<Registration>> {
        (**self).list_by_event(event_id, status)
    }

    fn get(&self, user_id: &UserId, event_id: EventId) -> Result<Registration> {
        (**self).get(user_id, event_id)
    }

    fn insert(&self, registration: Registration) -> Result<()> {
        (**self).insert(registration)
    }

    fn update_status(&self, user_id: &UserId, event_id: EventId, status: Status) -> Result<()> {
        (**self).update_status(user_id, event_id, status)
    }

    fn delete(&self, user_id: &UserId, event_id: EventId) -> Result<Registration> {
        (**self).delete(user_id, event_id)
    }

    fn count_by_status(&self, event_id: EventId, status: Status) -> Result<usize> {
        (**self).count_by_status(event_id, status)
    }

    fn next_sequence(&self, event_id: EventId) -> Result<u64> {
        (**self).next_sequence(event_id)
    }

    fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Registration>> {
        (**self).list_by_user(user_id)
    }

    fn clear_event(&self, event_id: EventId) -> Result<usize> {
        (**self).clear_event(event_id)
    }

    fn cancel_and_promote(
        &self,
        user_id: &UserId,
        event_id: EventId,
        main_capacity: u32,
    ) -> Result<PromotionOutcome> {
        (**self).cancel_and_promote(user_id, event_id, main_capacity)
    }
}

/// One event's registrations, kept in ascending sequence order
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLedger {
    /// High-water mark; sequence numbers below this are never handed out again
    next_sequence: u64,
    registrations: Vec<Registration>,
}

impl EventLedger {
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn get(&self, user_id: &UserId) -> Option<&Registration> {
        self.registrations.iter().find(|r| &r.user_id == user_id)
    }

    pub fn list(&self, status: Option<Status>) -> Vec<Registration> {
        self.registrations
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect()
    }

    pub fn count(&self, status: Status) -> usize {
        self.registrations
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn insert(&mut self, registration: Registration) -> Result<()> {
        if self.get(&registration.user_id).is_some() {
            return Err(Error::DuplicateRegistration {
                user: registration.user_id,
                event: registration.event_id,
            });
        }

        self.next_sequence = self.next_sequence.max(registration.sequence + 1);
        let idx = self
            .registrations
            .partition_point(|r| r.sequence < registration.sequence);
        self.registrations.insert(idx, registration);
        Ok(())
    }

    pub fn update_status(
        &mut self,
        user_id: &UserId,
        event_id: EventId,
        status: Status,
    ) -> Result<()> {
        let registration = self
            .registrations
            .iter_mut()
            .find(|r| &r.user_id == user_id)
            .ok_or_else(|| Error::NotFound {
                user: user_id.clone(),
                event: event_id,
            })?;
        registration.status = status;
        Ok(())
    }

    pub fn remove(&mut self, user_id: &UserId, event_id: EventId) -> Result<Registration> {
        let idx = self
            .registrations
            .iter()
            .position(|r| &r.user_id == user_id)
            .ok_or_else(|| Error::NotFound {
                user: user_id.clone(),
                event: event_id,
            })?;
        Ok(self.registrations.remove(idx))
    }

    /// Remove a registration and promote the oldest reserve registration
    /// into a freed main slot, as one in-memory change
    ///
    /// Nothing is modified when the user holds no registration.
    pub fn cancel_and_promote(
        &mut self,
        user_id: &UserId,
        event_id: EventId,
        main_capacity: u32,
    ) -> Result<PromotionOutcome> {
        let cancelled = self.remove(user_id, event_id)?;
        if cancelled.status != Status::Registered
            || self.count(Status::Registered) >= main_capacity as usize
        {
            return Ok(PromotionOutcome {
                cancelled,
                promoted: None,
            });
        }

        // Registrations are in sequence order, so the first reserve is the oldest
        let promoted = self
            .registrations
            .iter_mut()
            .find(|r| r.status == Status::Reserve)
            .map(|next| {
                next.status = Status::Registered;
                next.clone()
            });

        Ok(PromotionOutcome {
            cancelled,
            promoted,
        })
    }
}
