use super::store::StoreError;
use super::StatsDocument;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Serialize)]
struct SessionRow<'a> {
    date: String,
    time: String,
    technique_id: &'a str,
    technique: &'a str,
    duration_seconds: u64,
    completed: bool,
}

/// Write the session history as CSV, oldest first. Returns the row count.
pub fn write_sessions<W: Write>(doc: &StatsDocument, writer: W) -> Result<usize, StoreError> {
    let mut csv = csv::Writer::from_writer(writer);
    for s in &doc.sessions {
        csv.serialize(SessionRow {
            date: s.local_date().format("%Y-%m-%d").to_string(),
            time: s.timestamp.format("%H:%M:%S").to_string(),
            technique_id: &s.technique_id,
            technique: &s.technique_name,
            duration_seconds: s.duration_seconds,
            completed: s.completed,
        })?;
    }
    csv.flush()?;
    Ok(doc.sessions.len())
}

pub fn export_sessions<P: AsRef<Path>>(doc: &StatsDocument, path: P) -> Result<usize, StoreError> {
    let file = File::create(path)?;
    write_sessions(doc, file)
}
