//! Practice statistics: the persisted document, the fold that adds a
//! session to it, and the read-only projections used for display.

pub mod aggregator;
pub mod export;
pub mod store;
pub mod streak;
pub mod views;

use crate::session::SessionRecord;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use aggregator::{LoadOutcome, RecordOutcome, StatsAggregator};
pub use store::{FileStatsStore, MemoryStatsStore, SqliteStatsStore, StatsStore, StoreError};
pub use streak::{Milestone, MILESTONES};

/// Per-day bucket keyed by local calendar date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub date: NaiveDate,
    pub total_duration_seconds: u64,
    pub sessions_count: u32,
    #[serde(default)]
    pub technique_counts: BTreeMap<String, u32>,
}

impl DailyStat {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_duration_seconds: 0,
            sessions_count: 0,
            technique_counts: BTreeMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.sessions_count > 0
    }
}

/// The single persisted aggregate of all practice history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsDocument {
    pub total_sessions: u32,
    pub total_duration_seconds: u64,
    #[serde(rename = "lastSessionDateIso")]
    pub last_session: Option<DateTime<Local>>,
    pub streak: u32,
    pub max_streak: u32,
    pub last_streak_milestone: Option<u32>,
    pub streak_milestone_message: Option<String>,
    pub sessions: Vec<SessionRecord>,
    pub daily_stats: BTreeMap<NaiveDate, DailyStat>,
    pub favorite_techniques: BTreeMap<String, u32>,
}

impl StatsDocument {
    /// Fold one session into the document and recompute streak state.
    /// Returns the milestone newly reached by this session, if any.
    pub fn apply(&mut self, record: SessionRecord, today: NaiveDate) -> Option<Milestone> {
        let day = record.local_date();
        let bucket = self
            .daily_stats
            .entry(day)
            .or_insert_with(|| DailyStat::empty(day));
        bucket.total_duration_seconds += record.duration_seconds;
        bucket.sessions_count += 1;
        *bucket
            .technique_counts
            .entry(record.technique_id.clone())
            .or_insert(0) += 1;

        self.total_sessions += 1;
        self.total_duration_seconds += record.duration_seconds;
        self.last_session = Some(record.timestamp);
        *self
            .favorite_techniques
            .entry(record.technique_id.clone())
            .or_insert(0) += 1;
        self.sessions.push(record);

        let previous = self.streak;
        self.streak = streak::current_streak(
            &self.daily_stats,
            self.last_session.map(|ts| ts.date_naive()),
            today,
        );

        let reached = streak::newly_reached(previous, self.streak);
        if let Some(milestone) = reached {
            self.last_streak_milestone = Some(milestone.days);
            self.streak_milestone_message = Some(milestone.message.to_string());
        }
        self.max_streak = self.max_streak.max(self.streak);
        reached
    }

    /// Invariants that must hold after any sequence of `apply` calls
    pub fn is_consistent(&self) -> bool {
        let duration: u64 = self.sessions.iter().map(|s| s.duration_seconds).sum();
        let buckets_match = self.daily_stats.iter().all(|(date, bucket)| {
            bucket.sessions_count as usize
                == self
                    .sessions
                    .iter()
                    .filter(|s| s.local_date() == *date)
                    .count()
        });

        self.total_sessions as usize == self.sessions.len()
            && self.total_duration_seconds == duration
            && self.streak <= self.max_streak
            && buckets_match
    }
}
