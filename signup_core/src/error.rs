//! Error types for the signup_core library.

use crate::{EventId, UserId};
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for signup_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No event with this ID exists in the catalog
    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// The user already holds a registration for the event
    #[error("User {user} is already registered for event {event}")]
    AlreadyRegistered { user: UserId, event: EventId },

    /// Both the main list and the reserve list are full
    #[error("Event {0} is full")]
    EventFull(EventId),

    /// Cancel target (or ledger record) does not exist
    #[error("No registration for user {user} on event {event}")]
    NotFound { user: UserId, event: EventId },

    /// Ledger-level uniqueness guard
    #[error("Duplicate registration for user {user} on event {event}")]
    DuplicateRegistration { user: UserId, event: EventId },

    /// IO failure from the durable store
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event definition rejected by validation
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// The per-event lock could not be acquired before the deadline
    #[error("Timed out waiting for event {0}")]
    LockTimeout(EventId),

    /// The caller cancelled the request before it ran
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Expected, user-facing conditions that leave the ledger untouched
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::EventNotFound(_)
                | Error::AlreadyRegistered { .. }
                | Error::EventFull(_)
                | Error::NotFound { .. }
                | Error::DuplicateRegistration { .. }
                | Error::LockTimeout(_)
                | Error::Cancelled
        )
    }
}
