//! Roster export to CSV.
//!
//! Writes an event's main list followed by its reserve list, each in
//! arrival order. File exports are written to a temp file and renamed into
//! place so a reader never sees a partial roster.

use crate::{Registration, Result, Roster};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    list: &'static str,
    position: usize,
    user_id: &'a str,
    sequence: u64,
    registered_at: String,
}

impl<'a> CsvRow<'a> {
    fn new(list: &'static str, position: usize, registration: &'a Registration) -> Self {
        CsvRow {
            list,
            position,
            user_id: registration.user_id.as_str(),
            sequence: registration.sequence,
            registered_at: registration.registered_at.to_rfc3339(),
        }
    }
}

/// Write the roster as CSV to any writer, returning the number of rows
pub fn write_roster_csv<W: Write>(roster: &Roster, out: W) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    let mut rows = 0;

    for (list, registrations) in [("main", &roster.registered), ("reserve", &roster.reserve)] {
        for (idx, registration) in registrations.iter().enumerate() {
            writer.serialize(CsvRow::new(list, idx + 1, registration))?;
            rows += 1;
        }
    }

    writer.flush()?;
    Ok(rows)
}

/// Export the roster to `path`, replacing any previous export atomically
pub fn export_roster_csv(roster: &Roster, path: &Path) -> Result<usize> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    let rows = write_roster_csv(roster, temp.as_file())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| crate::Error::StoreUnavailable(e.error))?;

    tracing::info!(
        "Exported {} roster rows for event {} to {:?}",
        rows,
        roster.event.id,
        path
    );
    Ok(rows)
}
