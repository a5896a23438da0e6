//! Notice journal for handing engine outcomes to the messaging surface.
//!
//! Notices are appended to a JSONL (JSON Lines) file with file locking
//! to ensure safe concurrent access. Delivering them to users is left to
//! whoever reads the journal.

use crate::{EventId, PromotionOutcome, Result, Status, UserId};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What happened to a user's registration
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Registered,
    Reserved,
    Cancelled,
    Promoted,
}

impl From<Status> for NoticeKind {
    fn from(status: Status) -> Self {
        match status {
            Status::Registered => NoticeKind::Registered,
            Status::Reserve => NoticeKind::Reserved,
        }
    }
}

/// A single journal entry addressed to one user
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notice {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub event_id: EventId,
    pub user_id: UserId,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn new(event_id: EventId, user_id: UserId, kind: NoticeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            event_id,
            user_id,
            kind,
        }
    }

    /// Notices describing a cancellation: one for the canceller and, when
    /// a promotion happened, one for the promoted user
    pub fn for_cancellation(outcome: &PromotionOutcome) -> Vec<Notice> {
        let mut notices = vec![Notice::new(
            outcome.cancelled.event_id,
            outcome.cancelled.user_id.clone(),
            NoticeKind::Cancelled,
        )];
        if let Some(promoted) = &outcome.promoted {
            notices.push(Notice::new(
                promoted.event_id,
                promoted.user_id.clone(),
                NoticeKind::Promoted,
            ));
        }
        notices
    }
}

/// Notice sink trait for persisting notices
pub trait NoticeSink {
    fn append(&mut self, notice: &Notice) -> Result<()>;
}

/// JSONL-based notice sink with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    /// Create a new journal for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl NoticeSink for JsonlJournal {
    fn append(&mut self, notice: &Notice) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(notice)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!(
            "Journaled {:?} notice for {} on event {}",
            notice.kind,
            notice.user_id,
            notice.event_id
        );
        Ok(())
    }
}

/// Read all notices from a journal file
pub fn read_notices(path: &Path) -> Result<Vec<Notice>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut notices = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Notice>(&line) {
            Ok(notice) => notices.push(notice),
            Err(e) => {
                tracing::warn!("Failed to parse notice at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} notices from journal", notices.len());
    Ok(notices)
}

/// Notices addressed to one user, oldest first
pub fn notices_for(path: &Path, user_id: &UserId) -> Result<Vec<Notice>> {
    Ok(read_notices(path)?
        .into_iter()
        .filter(|n| &n.user_id == user_id)
        .collect())
}
