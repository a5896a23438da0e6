//! File-backed durable store with file locking.
//!
//! Layout under the store root:
//! - `events.json`: the event catalog
//! - `events.lock`: serializes catalog writers across processes
//! - `ledgers/event-<id>.json`: one registration ledger per event
//!
//! Every write goes to a temp file in the same directory which is synced and
//! atomically renamed over the target, so readers only ever see a complete
//! record. Ledger writers must hold the event's lock (see [`crate::lock`]);
//! the waitlist engine does this for every mutation.

use crate::catalog::{EventCatalog, EventTable};
use crate::ledger::{EventLedger, RegistrationLedger};
use crate::{
    Error, Event, EventDraft, EventId, PromotionOutcome, Registration, Result, Status, UserId,
};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const EVENTS_FILE: &str = "events.json";
const EVENTS_LOCK: &str = "events.lock";
const LEDGER_DIR: &str = "ledgers";

/// Durable store rooted at a data directory
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(LEDGER_DIR))?;
        tracing::debug!("Opened file store at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn events_path(&self) -> PathBuf {
        self.root.join(EVENTS_FILE)
    }

    fn ledger_path(&self, event_id: EventId) -> PathBuf {
        self.root
            .join(LEDGER_DIR)
            .join(format!("event-{}.json", event_id))
    }

    fn load_events(&self) -> Result<EventTable> {
        load_json(&self.events_path())
    }

    /// Load the catalog, modify it, and save it back under the catalog lock
    fn update_events<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut EventTable) -> Result<T>,
    {
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root.join(EVENTS_LOCK))?;
        lock.lock_exclusive()?;

        let result: Result<T> = (|| {
            let mut table = self.load_events()?;
            let value = f(&mut table)?;
            save_json(&self.events_path(), &table)?;
            Ok(value)
        })();

        lock.unlock()?;
        result
    }

    fn load_ledger(&self, event_id: EventId) -> Result<EventLedger> {
        load_json(&self.ledger_path(event_id))
    }

    fn update_ledger<T, F>(&self, event_id: EventId, f: F) -> Result<T>
    where
        F: FnOnce(&mut EventLedger) -> Result<T>,
    {
        let path = self.ledger_path(event_id);
        let mut ledger: EventLedger = load_json(&path)?;
        let value = f(&mut ledger)?;
        save_json(&path, &ledger)?;
        Ok(value)
    }

    /// Event IDs that currently have a ledger file
    fn ledger_ids(&self) -> Result<Vec<EventId>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(self.root.join(LEDGER_DIR))? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_prefix("event-"))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse::<u64>().ok())
            else {
                continue;
            };
            ids.push(EventId(id));
        }
        ids.sort();
        Ok(ids)
    }
}

impl EventCatalog for FileStore {
    fn get_event(&self, id: EventId) -> Result<Event> {
        self.load_events()?
            .get(id)
            .cloned()
            .ok_or(Error::EventNotFound(id))
    }

    fn put_event(&self, event: &Event) -> Result<()> {
        self.update_events(|table| table.put(event.clone()))
    }

    fn create_event(&self, draft: EventDraft) -> Result<Event> {
        let event = self.update_events(|table| table.create(draft))?;
        tracing::debug!("Stored event {} in {:?}", event.id, self.events_path());
        Ok(event)
    }

    fn delete_event(&self, id: EventId) -> Result<Event> {
        self.update_events(|table| table.remove(id))
    }

    fn list_events(&self) -> Result<Vec<Event>> {
        Ok(self.load_events()?.events().to_vec())
    }
}

impl RegistrationLedger for FileStore {
    fn list_by_event(
        &self,
        event_id: EventId,
        status: Option<Status>,
    ) -> Result<Vec<Registration>> {
        Ok(self.load_ledger(event_id)?.list(status))
    }

    fn get(&self, user_id: &UserId, event_id: EventId) -> Result<Registration> {
        self.load_ledger(event_id)?
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                user: user_id.clone(),
                event: event_id,
            })
    }

    fn insert(&self, registration: Registration) -> Result<()> {
        self.update_ledger(registration.event_id, |ledger| {
            ledger.insert(registration)
        })
    }

    fn update_status(&self, user_id: &UserId, event_id: EventId, status: Status) -> Result<()> {
        self.update_ledger(event_id, |ledger| {
            ledger.update_status(user_id, event_id, status)
        })
    }

    fn delete(&self, user_id: &UserId, event_id: EventId) -> Result<Registration> {
        // The emptied ledger is kept so its sequence high-water mark survives
        self.update_ledger(event_id, |ledger| ledger.remove(user_id, event_id))
    }

    fn count_by_status(&self, event_id: EventId, status: Status) -> Result<usize> {
        Ok(self.load_ledger(event_id)?.count(status))
    }

    fn next_sequence(&self, event_id: EventId) -> Result<u64> {
        Ok(self.load_ledger(event_id)?.next_sequence())
    }

    fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Registration>> {
        let mut found = Vec::new();
        for event_id in self.ledger_ids()? {
            if let Some(registration) = self.load_ledger(event_id)?.get(user_id) {
                found.push(registration.clone());
            }
        }
        Ok(found)
    }

    fn clear_event(&self, event_id: EventId) -> Result<usize> {
        let path = self.ledger_path(event_id);
        if !path.exists() {
            return Ok(0);
        }

        let count = self.load_ledger(event_id)?.len();
        std::fs::remove_file(&path)?;
        tracing::debug!("Removed ledger {:?} ({} registrations)", path, count);
        Ok(count)
    }

    fn cancel_and_promote(
        &self,
        user_id: &UserId,
        event_id: EventId,
        main_capacity: u32,
    ) -> Result<PromotionOutcome> {
        self.update_ledger(event_id, |ledger| {
            ledger.cancel_and_promote(user_id, event_id, main_capacity)
        })
    }
}

/// Read a JSON document with shared locking; a missing file yields the default
fn load_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    let value = serde_json::from_str(&contents).map_err(|e| {
        tracing::warn!("Failed to parse store file {:?}: {}", path, e);
        e
    })?;
    Ok(value)
}

/// Atomically replace `path` with the JSON encoding of `value`
///
/// Writes to a temp file in the same directory, syncs it, and renames it
/// over the original.
fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string(value)?;
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;

    temp.persist(path).map_err(|e| Error::StoreUnavailable(e.error))?;

    tracing::debug!("Saved {:?}", path);
    Ok(())
}
