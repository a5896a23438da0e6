//! Event catalog: the set of events users can sign up for.
//!
//! Events are written at administration time and read on every
//! register/cancel. The [`EventTable`] holds the in-memory representation
//! shared by every store backend.

use crate::{Error, Event, EventDraft, EventId, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Read/write contract for event definitions
pub trait EventCatalog: Send + Sync {
    /// Look up an event, failing with [`Error::EventNotFound`] if absent
    fn get_event(&self, id: EventId) -> Result<Event>;

    /// Insert or replace an event definition
    fn put_event(&self, event: &Event) -> Result<()>;

    /// Allocate an ID for the draft and store it as one atomic step
    fn create_event(&self, draft: EventDraft) -> Result<Event>;

    /// Remove an event definition, returning what was removed
    fn delete_event(&self, id: EventId) -> Result<Event>;

    /// All events ordered by ID
    fn list_events(&self) -> Result<Vec<Event>>;
}

impl<T: EventCatalog + ?Sized> EventCatalog for Arc<T> {
    fn get_event(&self, id: EventId) -> Result<Event> {
        (**self).get_event(id)
    }

    fn put_event(&self, event: &Event) -> Result<()> {
        (**self).put_event(event)
    }

    fn create_event(&self, draft: EventDraft) -> Result<Event> {
        (**self).create_event(draft)
    }

    fn delete_event(&self, id: EventId) -> Result<Event> {
        (**self).delete_event(id)
    }

    fn list_events(&self) -> Result<Vec<Event>> {
        (**self).list_events()
    }
}

/// Events kept sorted by ID
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventTable {
    /// High-water mark so removed IDs are never handed out again
    #[serde(default)]
    next_id: u64,
    events: Vec<Event>,
}

impl EventTable {
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.position(id).ok().map(|idx| &self.events[idx])
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Replace an existing event, or insert one under an ID not yet handed out
    pub fn put(&mut self, event: Event) -> Result<()> {
        if event.main_capacity == 0 {
            return Err(Error::InvalidEvent(format!(
                "event {} must have a main capacity of at least 1",
                event.id
            )));
        }

        match self.position(event.id) {
            Ok(idx) => self.events[idx] = event,
            Err(idx) => {
                let next_id = id_after(event.id)?;
                if event.id.0 < self.next_id {
                    return Err(Error::InvalidEvent(format!(
                        "event ID {} was already used by a removed event",
                        event.id
                    )));
                }
                self.next_id = next_id;
                self.events.insert(idx, event);
            }
        }
        Ok(())
    }

    /// Store a new event under an ID no earlier event has used
    pub fn create(&mut self, draft: EventDraft) -> Result<Event> {
        let errors = draft.validate();
        if !errors.is_empty() {
            return Err(Error::InvalidEvent(errors.join("; ")));
        }

        let after_last = match self.events.last() {
            Some(last) => id_after(last.id)?,
            None => 1,
        };
        let id = EventId(self.next_id.max(after_last).max(1));
        self.next_id = id_after(id)?;
        let event = draft.into_event(id);
        self.events.push(event.clone());
        Ok(event)
    }

    pub fn remove(&mut self, id: EventId) -> Result<Event> {
        match self.position(id) {
            Ok(idx) => Ok(self.events.remove(idx)),
            Err(_) => Err(Error::EventNotFound(id)),
        }
    }

    fn position(&self, id: EventId) -> std::result::Result<usize, usize> {
        self.events.binary_search_by_key(&id, |e| e.id)
    }
}

/// Next ID in sequence; IDs start at 1 and stop short of overflow
fn id_after(id: EventId) -> Result<u64> {
    if id.0 == 0 {
        return Err(Error::InvalidEvent("event IDs start at 1".into()));
    }
    id.0.checked_add(1)
        .ok_or_else(|| Error::InvalidEvent(format!("event ID {} is out of range", id)))
}
