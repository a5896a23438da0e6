#![forbid(unsafe_code)]

//! Core domain model and business logic for the event sign-up system.
//!
//! This crate provides:
//! - Domain types (events, registrations, statuses)
//! - Event catalog and registration ledger contracts
//! - Persistence (in-memory and file-backed stores)
//! - The waitlist engine with per-event locking
//! - Notice journal and roster export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod catalog;
pub mod ledger;
pub mod memory;
pub mod store;
pub mod lock;
pub mod engine;
pub mod journal;
pub mod roster;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::EventCatalog;
pub use ledger::RegistrationLedger;
pub use config::Config;
pub use memory::MemoryStore;
pub use store::FileStore;
pub use lock::{CancelToken, EventLocks, RequestContext};
pub use engine::WaitlistEngine;
pub use journal::{JsonlJournal, Notice, NoticeKind, NoticeSink};
pub use roster::{export_roster_csv, write_roster_csv};
