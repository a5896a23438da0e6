//! Core domain types for the event sign-up system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Identifiers for events and users
//! - Event definitions with main and reserve capacity
//! - Registrations and their status
//! - Outcomes returned to callers of the waitlist engine

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique, immutable event identifier
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque user identifier supplied by the identity provider
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// An event users can sign up for
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub main_capacity: u32,
    pub reserve_capacity: u32,
}

impl Event {
    /// Day of the week the event falls on
    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    /// Capacity available to a given status class
    pub fn capacity_for(&self, status: Status) -> u32 {
        match status {
            Status::Registered => self.main_capacity,
            Status::Reserve => self.reserve_capacity,
        }
    }
}

/// Event definition before the catalog assigns it an ID
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventDraft {
    pub name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub main_capacity: u32,
    pub reserve_capacity: u32,
}

impl EventDraft {
    /// Validate the draft before it is stored
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Event has empty name".to_string());
        }
        if self.main_capacity == 0 {
            errors.push(format!(
                "Event '{}' must have a main capacity of at least 1",
                self.name
            ));
        }

        errors
    }

    pub fn into_event(self, id: EventId) -> Event {
        Event {
            id,
            name: self.name.trim().to_string(),
            date: self.date,
            time: self.time,
            main_capacity: self.main_capacity,
            reserve_capacity: self.reserve_capacity,
        }
    }
}

// ============================================================================
// Registration Types
// ============================================================================

/// Which list a registration currently sits on
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Holds one of the main slots
    Registered,
    /// Waiting on the reserve list
    Reserve,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Registered => f.write_str("registered"),
            Status::Reserve => f.write_str("reserve"),
        }
    }
}

/// A single user's sign-up for a single event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    pub user_id: UserId,
    pub event_id: EventId,
    pub status: Status,
    /// Per-event arrival order; never reused
    pub sequence: u64,
    pub registered_at: DateTime<Utc>,
}

// ============================================================================
// Engine Outcomes
// ============================================================================

/// Result of a successful cancellation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromotionOutcome {
    /// The registration that was removed
    pub cancelled: Registration,
    /// The reserve registration moved onto the main list, if any
    pub promoted: Option<Registration>,
}

impl PromotionOutcome {
    pub fn promoted_user(&self) -> Option<&UserId> {
        self.promoted.as_ref().map(|r| &r.user_id)
    }
}

/// Read-only snapshot of an event's two lists
#[derive(Clone, Debug)]
pub struct Roster {
    pub event: Event,
    pub registered: Vec<Registration>,
    pub reserve: Vec<Registration>,
}

impl Roster {
    pub fn open_main_slots(&self) -> u32 {
        self.event
            .main_capacity
            .saturating_sub(self.registered.len() as u32)
    }

    pub fn open_reserve_slots(&self) -> u32 {
        self.event
            .reserve_capacity
            .saturating_sub(self.reserve.len() as u32)
    }
}
