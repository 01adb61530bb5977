use crate::sequencer::{SessionStatus, Sequencer};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Sessions shorter than this are not worth recording
pub const MIN_SESSION_SECONDS: u64 = 10;

/// One finished or interrupted practice, as persisted in the stats document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub technique_id: String,
    pub technique_name: String,
    /// Time actually practiced, not the configured target
    pub duration_seconds: u64,
    #[serde(rename = "timestampIso")]
    pub timestamp: DateTime<Local>,
    pub completed: bool,
}

impl SessionRecord {
    pub fn new(
        technique_id: &str,
        technique_name: &str,
        duration_seconds: u64,
        timestamp: DateTime<Local>,
        completed: bool,
    ) -> Self {
        Self {
            technique_id: technique_id.to_string(),
            technique_name: technique_name.to_string(),
            duration_seconds,
            timestamp,
            completed,
        }
    }

    /// Build the record for a run that has stopped or completed.
    /// Returns None while the run is still going or was never started.
    pub fn from_run(
        sequencer: &Sequencer,
        technique_id: &str,
        technique_name: &str,
        timestamp: DateTime<Local>,
    ) -> Option<Self> {
        let completed = match sequencer.status() {
            SessionStatus::Completed => true,
            SessionStatus::Stopped => false,
            SessionStatus::Idle | SessionStatus::Running => return None,
        };
        Some(Self::new(
            technique_id,
            technique_name,
            sequencer.elapsed_ms() / 1000,
            timestamp,
            completed,
        ))
    }

    /// Calendar day of the session in local time
    pub fn local_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn is_worth_recording(&self) -> bool {
        self.duration_seconds >= MIN_SESSION_SECONDS
    }
}
