//! Per-event mutual exclusion with bounded acquisition.
//!
//! Each event gets its own `parking_lot` mutex, so operations on different
//! events never contend. When a lock directory is configured, the critical
//! section additionally holds an exclusive `fs2` lock on
//! `<dir>/event-<id>.lock`, which serializes separate processes sharing one
//! file store.
//!
//! Acquisition polls in short slices so that a caller's deadline or
//! cancellation token is honoured while waiting.

use crate::{Error, EventId, Result, UserId};
use dashmap::DashMap;
use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared flag a caller flips to abandon a pending request
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Explicit per-request context passed into every engine call
///
/// Carries the already-authenticated user plus the caller's patience.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub user_id: UserId,
    pub deadline: Option<Instant>,
    pub cancel: CancelToken,
}

impl RequestContext {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Lock table keyed by event
#[derive(Debug, Default)]
pub struct EventLocks {
    slots: DashMap<EventId, Arc<Mutex<()>>>,
    lock_dir: Option<PathBuf>,
}

impl EventLocks {
    /// In-process locking only
    pub fn new() -> Self {
        Self::default()
    }

    /// In-process locking plus advisory lock files under `dir`
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            slots: DashMap::new(),
            lock_dir: Some(dir),
        })
    }

    /// Run `f` while holding the event's lock
    ///
    /// Waits until `ctx.deadline`, or `default_timeout` from now when the
    /// caller set none. Fails with [`Error::LockTimeout`] or
    /// [`Error::Cancelled`] without running `f`.
    pub fn run<T, F>(
        &self,
        event_id: EventId,
        ctx: &RequestContext,
        default_timeout: Duration,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let deadline = ctx
            .deadline
            .unwrap_or_else(|| Instant::now() + default_timeout);

        let slot = self
            .slots
            .entry(event_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let _guard = acquire_slot(&slot, event_id, ctx, deadline)?;
        let _file = match &self.lock_dir {
            Some(dir) => Some(acquire_file(dir, event_id, ctx, deadline)?),
            None => None,
        };

        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        f()
    }
}

fn acquire_slot<'a>(
    slot: &'a Mutex<()>,
    event_id: EventId,
    ctx: &RequestContext,
    deadline: Instant,
) -> Result<MutexGuard<'a, ()>> {
    loop {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(guard) = slot.try_lock() {
            return Ok(guard);
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!("Timed out waiting for lock on event {}", event_id);
            return Err(Error::LockTimeout(event_id));
        }
        if let Some(guard) = slot.try_lock_for((deadline - now).min(POLL_INTERVAL)) {
            return Ok(guard);
        }
    }
}

/// Exclusive lock file, released on drop
struct FileLockGuard(File);

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = self.0.unlock();
    }
}

fn acquire_file(
    dir: &Path,
    event_id: EventId,
    ctx: &RequestContext,
    deadline: Instant,
) -> Result<FileLockGuard> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(dir.join(format!("event-{}.lock", event_id)))?;

    loop {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match file.try_lock_exclusive() {
            Ok(()) => return Ok(FileLockGuard(file)),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {}
            Err(e) => return Err(Error::StoreUnavailable(e)),
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!("Timed out waiting for lock file of event {}", event_id);
            return Err(Error::LockTimeout(event_id));
        }
        std::thread::sleep((deadline - now).min(POLL_INTERVAL));
    }
}
