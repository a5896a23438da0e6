//! In-memory store implementing both storage contracts.
//!
//! Each map sits behind a `parking_lot::RwLock`, so display reads run
//! alongside mutations but never see a half-applied write.

use crate::catalog::{EventCatalog, EventTable};
use crate::ledger::{EventLedger, RegistrationLedger};
use crate::{
    Error, Event, EventDraft, EventId, PromotionOutcome, Registration, Result, Status, UserId,
};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    events: RwLock<EventTable>,
    ledgers: RwLock<HashMap<EventId, EventLedger>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventCatalog for MemoryStore {
    fn get_event(&self, id: EventId) -> Result<Event> {
        self.events
            .read()
            .get(id)
            .cloned()
            .ok_or(Error::EventNotFound(id))
    }

    fn put_event(&self, event: &Event) -> Result<()> {
        self.events.write().put(event.clone())
    }

    fn create_event(&self, draft: EventDraft) -> Result<Event> {
        self.events.write().create(draft)
    }

    fn delete_event(&self, id: EventId) -> Result<Event> {
        self.events.write().remove(id)
    }

    fn list_events(&self) -> Result<Vec<Event>> {
        Ok(self.events.read().events().to_vec())
    }
}

impl RegistrationLedger for MemoryStore {
    fn list_by_event(
        &self,
        event_id: EventId,
        status: Option<Status>,
    ) -> Result<Vec<Registration>> {
        Ok(self
            .ledgers
            .read()
            .get(&event_id)
            .map(|ledger| ledger.list(status))
            .unwrap_or_default())
    }

    fn get(&self, user_id: &UserId, event_id: EventId) -> Result<Registration> {
        self.ledgers
            .read()
            .get(&event_id)
            .and_then(|ledger| ledger.get(user_id).cloned())
            .ok_or_else(|| Error::NotFound {
                user: user_id.clone(),
                event: event_id,
            })
    }

    fn insert(&self, registration: Registration) -> Result<()> {
        self.ledgers
            .write()
            .entry(registration.event_id)
            .or_default()
            .insert(registration)
    }

    fn update_status(&self, user_id: &UserId, event_id: EventId, status: Status) -> Result<()> {
        match self.ledgers.write().get_mut(&event_id) {
            Some(ledger) => ledger.update_status(user_id, event_id, status),
            None => Err(Error::NotFound {
                user: user_id.clone(),
                event: event_id,
            }),
        }
    }

    fn delete(&self, user_id: &UserId, event_id: EventId) -> Result<Registration> {
        match self.ledgers.write().get_mut(&event_id) {
            Some(ledger) => ledger.remove(user_id, event_id),
            None => Err(Error::NotFound {
                user: user_id.clone(),
                event: event_id,
            }),
        }
    }

    fn count_by_status(&self, event_id: EventId, status: Status) -> Result<usize> {
        Ok(self
            .ledgers
            .read()
            .get(&event_id)
            .map_or(0, |ledger| ledger.count(status)))
    }

    fn next_sequence(&self, event_id: EventId) -> Result<u64> {
        Ok(self
            .ledgers
            .read()
            .get(&event_id)
            .map_or(0, EventLedger::next_sequence))
    }

    fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Registration>> {
        let ledgers = self.ledgers.read();
        let mut found: Vec<_> = ledgers
            .values()
            .filter_map(|ledger| ledger.get(user_id).cloned())
            .collect();
        found.sort_by_key(|r| r.event_id);
        Ok(found)
    }

    fn clear_event(&self, event_id: EventId) -> Result<usize> {
        Ok(self
            .ledgers
            .write()
            .remove(&event_id)
            .map_or(0, |ledger| ledger.len()))
    }

    fn cancel_and_promote(
        &self,
        user_id: &UserId,
        event_id: EventId,
        main_capacity: u32,
    ) -> Result<PromotionOutcome> {
        match self.ledgers.write().get_mut(&event_id) {
            Some(ledger) => ledger.cancel_and_promote(user_id, event_id, main_capacity),
            None => Err(Error::NotFound {
                user: user_id.clone(),
                event: event_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn registration(user: &str, event: u64, sequence: u64) -> Registration {
        Registration {
            user_id: user.into(),
            event_id: EventId(event),
            status: Status::Registered,
            sequence,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_catalog_roundtrip() {
        let store = MemoryStore::new();
        let event = store
            .create_event(EventDraft {
                name: "Tree planting".into(),
                date: NaiveDate::from_ymd_opt(2027, 3, 20).unwrap(),
                time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                main_capacity: 10,
                reserve_capacity: 5,
            })
            .unwrap();

        assert_eq!(store.get_event(event.id).unwrap(), event);
        assert_eq!(store.list_events().unwrap().len(), 1);

        store.delete_event(event.id).unwrap();
        assert!(matches!(
            store.get_event(event.id),
            Err(Error::EventNotFound(_))
        ));
    }

    #[test]
    fn test_missing_ledger_behaves_as_empty() {
        let store = MemoryStore::new();
        assert!(store.list_by_event(EventId(4), None).unwrap().is_empty());
        assert_eq!(store.count_by_status(EventId(4), Status::Reserve).unwrap(), 0);
        assert_eq!(store.next_sequence(EventId(4)).unwrap(), 0);
        assert!(store.find(&"ana".into(), EventId(4)).unwrap().is_none());
        assert!(matches!(
            store.delete(&"ana".into(), EventId(4)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_by_user_spans_events() {
        let store = MemoryStore::new();
        store.insert(registration("ana", 2, 0)).unwrap();
        store.insert(registration("ana", 1, 0)).unwrap();
        store.insert(registration("ben", 1, 1)).unwrap();

        let mine = store.list_by_user(&"ana".into()).unwrap();
        let events: Vec<_> = mine.iter().map(|r| r.event_id).collect();
        assert_eq!(events, vec![EventId(1), EventId(2)]);
    }

    #[test]
    fn test_clear_event() {
        let store = MemoryStore::new();
        store.insert(registration("ana", 1, 0)).unwrap();
        store.insert(registration("ben", 1, 1)).unwrap();

        assert_eq!(store.clear_event(EventId(1)).unwrap(), 2);
        assert_eq!(store.clear_event(EventId(1)).unwrap(), 0);
    }
}
